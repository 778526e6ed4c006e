//! Create the `payloads` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Payloads::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payloads::PayloadId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payloads::PayloadHash).text())
                    .col(ColumnDef::new(Payloads::DeviceId).big_integer().not_null())
                    .col(ColumnDef::new(Payloads::RootPath).text().not_null())
                    .col(
                        ColumnDef::new(Payloads::FileCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Payloads::TotalBytes)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Payloads::Status)
                            .text()
                            .not_null()
                            .default("incomplete"),
                    )
                    .col(ColumnDef::new(Payloads::LastBuiltAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payloads_root_device_unique")
                    .table(Payloads::Table)
                    .col(Payloads::RootPath)
                    .col(Payloads::DeviceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payloads_hash")
                    .table(Payloads::Table)
                    .col(Payloads::PayloadHash)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payloads::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(super) enum Payloads {
    Table,
    PayloadId,
    PayloadHash,
    DeviceId,
    RootPath,
    FileCount,
    TotalBytes,
    Status,
    LastBuiltAt,
}
