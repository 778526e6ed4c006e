//! Create the `devices` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Devices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Devices::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Devices::FsUuid).text().not_null().unique_key())
                    .col(ColumnDef::new(Devices::DeviceId).big_integer().not_null().unique_key())
                    .col(ColumnDef::new(Devices::Alias).text().not_null().unique_key())
                    .col(ColumnDef::new(Devices::MountPoint).text().not_null())
                    .col(ColumnDef::new(Devices::PreferredMountPoint).text().not_null())
                    .col(ColumnDef::new(Devices::FsType).text().not_null())
                    .col(ColumnDef::new(Devices::ZfsPoolName).text())
                    .col(ColumnDef::new(Devices::ZfsDatasetName).text())
                    .col(ColumnDef::new(Devices::ZfsPoolGuid).text())
                    .col(ColumnDef::new(Devices::FirstScannedAt).timestamp().not_null())
                    .col(ColumnDef::new(Devices::LastScannedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Devices::ScanCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Devices::TotalFiles)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Devices::TotalBytes)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Devices::DeviceIdHistory)
                            .json()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_devices_fs_uuid")
                    .table(Devices::Table)
                    .col(Devices::FsUuid)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Devices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Devices {
    Table,
    Id,
    FsUuid,
    DeviceId,
    Alias,
    MountPoint,
    PreferredMountPoint,
    FsType,
    ZfsPoolName,
    ZfsDatasetName,
    ZfsPoolGuid,
    FirstScannedAt,
    LastScannedAt,
    ScanCount,
    TotalFiles,
    TotalBytes,
    DeviceIdHistory,
}
