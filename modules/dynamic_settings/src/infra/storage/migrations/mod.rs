//! Database migrations for dynamic settings

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_settings::Migration),
            Box::new(m20250301_000002_create_setting_histories::Migration),
        ]
    }
}

mod m20250301_000001_create_settings {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_settings"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Settings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Settings::Namespace)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(Settings::Key).string_len(190).not_null())
                        .col(
                            ColumnDef::new(Settings::ValueType)
                                .string_len(32)
                                .not_null()
                                .default("string"),
                        )
                        .col(ColumnDef::new(Settings::RawValue).text())
                        .col(ColumnDef::new(Settings::Description).text())
                        .col(
                            ColumnDef::new(Settings::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Settings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Settings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .primary_key(Index::create().col(Settings::Namespace).col(Settings::Key))
                        .to_owned(),
                )
                .await?;

            // Incremental refresh scans by update time
            manager
                .create_index(
                    Index::create()
                        .name("idx_settings_namespace_updated_at")
                        .table(Settings::Table)
                        .col(Settings::Namespace)
                        .col(Settings::UpdatedAt)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Settings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Settings {
        Table,
        Namespace,
        Key,
        ValueType,
        RawValue,
        Description,
        Deleted,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_setting_histories {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_setting_histories"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SettingHistories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SettingHistories::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(SettingHistories::Namespace)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(SettingHistories::Key)
                                .string_len(190)
                                .not_null(),
                        )
                        .col(ColumnDef::new(SettingHistories::Value).text())
                        .col(
                            ColumnDef::new(SettingHistories::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(SettingHistories::ChangedBy).string())
                        .col(
                            ColumnDef::new(SettingHistories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_setting_histories_namespace_key_created_at")
                        .table(SettingHistories::Table)
                        .col(SettingHistories::Namespace)
                        .col(SettingHistories::Key)
                        .col(SettingHistories::CreatedAt)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SettingHistories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SettingHistories {
        Table,
        Id,
        Namespace,
        Key,
        Value,
        Deleted,
        ChangedBy,
        CreatedAt,
    }
}
