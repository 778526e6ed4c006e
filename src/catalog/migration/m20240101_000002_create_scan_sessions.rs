//! Create the `scan_sessions` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScanSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScanSessions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScanSessions::ScanId).uuid().not_null().unique_key())
                    .col(ColumnDef::new(ScanSessions::FsUuid).text().not_null())
                    .col(ColumnDef::new(ScanSessions::DeviceId).big_integer().not_null())
                    .col(ColumnDef::new(ScanSessions::RootPath).text().not_null())
                    .col(ColumnDef::new(ScanSessions::StartedAt).timestamp().not_null())
                    .col(ColumnDef::new(ScanSessions::CompletedAt).timestamp())
                    .col(ColumnDef::new(ScanSessions::DurationSeconds).double())
                    .col(
                        ColumnDef::new(ScanSessions::Status)
                            .text()
                            .not_null()
                            .default("running"),
                    )
                    .col(
                        ColumnDef::new(ScanSessions::Parallel)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ScanSessions::Workers)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(ScanSessions::Scanned)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanSessions::Added)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanSessions::Updated)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanSessions::Unchanged)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanSessions::Deleted)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScanSessions::BytesHashed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scan_sessions_device_id")
                    .table(ScanSessions::Table)
                    .col(ScanSessions::DeviceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScanSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScanSessions {
    Table,
    Id,
    ScanId,
    FsUuid,
    DeviceId,
    RootPath,
    StartedAt,
    CompletedAt,
    DurationSeconds,
    Status,
    Parallel,
    Workers,
    Scanned,
    Added,
    Updated,
    Unchanged,
    Deleted,
    BytesHashed,
}
