//! Create the `scan_roots` table (composite primary key).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScanRoots::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ScanRoots::FsUuid).text().not_null())
                    .col(ColumnDef::new(ScanRoots::RootPath).text().not_null())
                    .col(ColumnDef::new(ScanRoots::LastScannedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(ScanRoots::ScanCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .col(ScanRoots::FsUuid)
                            .col(ScanRoots::RootPath),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScanRoots::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScanRoots {
    Table,
    FsUuid,
    RootPath,
    LastScannedAt,
    ScanCount,
}
