//! Create the `torrent_instances` table.

use sea_orm_migration::prelude::*;

use super::m20240103_000001_create_payloads::Payloads;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TorrentInstances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TorrentInstances::TorrentHash)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TorrentInstances::PayloadId).integer().not_null())
                    .col(ColumnDef::new(TorrentInstances::DeviceId).big_integer().not_null())
                    .col(ColumnDef::new(TorrentInstances::SavePath).text().not_null())
                    .col(ColumnDef::new(TorrentInstances::RootName).text().not_null())
                    .col(ColumnDef::new(TorrentInstances::Category).text())
                    .col(ColumnDef::new(TorrentInstances::Tags).text())
                    .col(ColumnDef::new(TorrentInstances::LastSeenAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_torrent_instances_payload_id")
                            .from(TorrentInstances::Table, TorrentInstances::PayloadId)
                            .to(Payloads::Table, Payloads::PayloadId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_torrent_instances_payload_id")
                    .table(TorrentInstances::Table)
                    .col(TorrentInstances::PayloadId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TorrentInstances::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TorrentInstances {
    Table,
    TorrentHash,
    PayloadId,
    DeviceId,
    SavePath,
    RootName,
    Category,
    Tags,
    LastSeenAt,
}
