//! API layer - in-process client and REST router

pub mod native;
pub mod rest;
