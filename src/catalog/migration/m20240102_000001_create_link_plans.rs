//! Create the `link_plans` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LinkPlans::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LinkPlans::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LinkPlans::Name).text().not_null())
                    .col(
                        ColumnDef::new(LinkPlans::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(LinkPlans::DeviceId).big_integer().not_null())
                    .col(ColumnDef::new(LinkPlans::DeviceAlias).text().not_null())
                    .col(ColumnDef::new(LinkPlans::MountPoint).text().not_null())
                    .col(
                        ColumnDef::new(LinkPlans::TotalOpportunities)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LinkPlans::TotalBytesSaveable)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LinkPlans::TotalBytesSaved)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LinkPlans::ActionsTotal)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LinkPlans::ActionsExecuted)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LinkPlans::ActionsFailed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LinkPlans::ActionsSkipped)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(LinkPlans::Metadata).json().not_null())
                    .col(ColumnDef::new(LinkPlans::Notes).text())
                    .col(ColumnDef::new(LinkPlans::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(LinkPlans::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_link_plans_device_id")
                    .table(LinkPlans::Table)
                    .col(LinkPlans::DeviceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LinkPlans::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(super) enum LinkPlans {
    Table,
    Id,
    Name,
    Status,
    DeviceId,
    DeviceAlias,
    MountPoint,
    TotalOpportunities,
    TotalBytesSaveable,
    TotalBytesSaved,
    ActionsTotal,
    ActionsExecuted,
    ActionsFailed,
    ActionsSkipped,
    Metadata,
    Notes,
    CreatedAt,
    UpdatedAt,
}
