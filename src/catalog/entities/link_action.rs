//! `link_actions` table (spec.md §3: LinkAction).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "link_actions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub plan_id: i32,

    /// `HARDLINK` | `SKIP` | `NOOP`.
    pub action_type: String,
    /// `pending` | `in_progress` | `completed` | `failed` | `skipped`.
    pub status: String,

    pub canonical_path: String,
    pub duplicate_path: String,
    pub canonical_inode: i64,
    pub duplicate_inode: i64,
    pub device_id: i64,

    pub file_size: i64,
    pub sha256: String,

    pub bytes_to_save: i64,
    pub bytes_saved: i64,

    pub executed_at: Option<DateTimeUtc>,
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::link_plan::Entity",
        from = "Column::PlanId",
        to = "super::link_plan::Column::Id"
    )]
    LinkPlan,
}

impl Related<super::link_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LinkPlan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
