//! Storage layer - settings store implementations

pub mod entity;
pub mod mapper;
pub mod memory;
pub mod migrations;
pub mod repositories;

pub use memory::InMemoryStore;
pub use repositories::SeaOrmSettingsStore;
