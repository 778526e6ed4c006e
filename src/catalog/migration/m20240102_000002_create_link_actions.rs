//! Create the `link_actions` table.

use sea_orm_migration::prelude::*;

use super::m20240102_000001_create_link_plans::LinkPlans;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LinkActions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LinkActions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LinkActions::PlanId).integer().not_null())
                    .col(
                        ColumnDef::new(LinkActions::ActionType)
                            .text()
                            .not_null()
                            .default("HARDLINK"),
                    )
                    .col(
                        ColumnDef::new(LinkActions::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(LinkActions::CanonicalPath).text().not_null())
                    .col(ColumnDef::new(LinkActions::DuplicatePath).text().not_null())
                    .col(ColumnDef::new(LinkActions::CanonicalInode).big_integer().not_null())
                    .col(ColumnDef::new(LinkActions::DuplicateInode).big_integer().not_null())
                    .col(ColumnDef::new(LinkActions::DeviceId).big_integer().not_null())
                    .col(ColumnDef::new(LinkActions::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(LinkActions::Sha256).text().not_null())
                    .col(
                        ColumnDef::new(LinkActions::BytesToSave)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LinkActions::BytesSaved)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(LinkActions::ExecutedAt).timestamp())
                    .col(ColumnDef::new(LinkActions::ErrorMessage).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_link_actions_plan_id")
                            .from(LinkActions::Table, LinkActions::PlanId)
                            .to(LinkPlans::Table, LinkPlans::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_link_actions_plan_id")
                    .table(LinkActions::Table)
                    .col(LinkActions::PlanId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LinkActions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LinkActions {
    Table,
    Id,
    PlanId,
    ActionType,
    Status,
    CanonicalPath,
    DuplicatePath,
    CanonicalInode,
    DuplicateInode,
    DeviceId,
    FileSize,
    Sha256,
    BytesToSave,
    BytesSaved,
    ExecutedAt,
    ErrorMessage,
}
