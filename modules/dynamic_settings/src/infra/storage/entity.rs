//! SeaORM entities for database tables

use sea_orm::entity::prelude::*;

/// Settings table entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    /// Partition (part of composite primary key); empty for the default one
    #[sea_orm(primary_key, auto_increment = false)]
    pub namespace: String,

    /// Setting key (part of composite primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,

    /// Value type name
    pub value_type: String,

    /// String-serialized value
    #[sea_orm(column_type = "Text", nullable)]
    pub raw_value: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Tombstone flag
    pub deleted: bool,

    /// Creation timestamp
    pub created_at: DateTimeUtc,

    /// Last update timestamp
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Setting history module
pub mod setting_history {
    use sea_orm::entity::prelude::*;

    /// Append-only history table entity
    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "setting_histories")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,

        pub namespace: String,

        /// Key of the setting at the time of the change
        pub key: String,

        /// Value after the change; null when deleted, secret or redacted
        #[sea_orm(column_type = "Text", nullable)]
        pub value: Option<String>,

        pub deleted: bool,

        #[sea_orm(nullable)]
        pub changed_by: Option<String>,

        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
