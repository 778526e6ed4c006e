//! `link_plans` table (spec.md §3: LinkPlan).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "link_plans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    /// `pending` | `in_progress` | `completed` | `failed` | `cancelled`.
    pub status: String,

    pub device_id: i64,
    pub device_alias: String,
    pub mount_point: String,

    pub total_opportunities: i64,
    pub total_bytes_saveable: i64,
    pub total_bytes_saved: i64,

    pub actions_total: i64,
    pub actions_executed: i64,
    pub actions_failed: i64,
    pub actions_skipped: i64,

    /// Opaque structured blob; documented keys per spec.md §9: `scope_status`,
    /// `scope_root`, `scope_rel_root`, `scope_out_of_scope`,
    /// `scope_verified_at`, `type`, `require_existing_hardlinks`.
    pub metadata: Json,
    pub notes: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::link_action::Entity")]
    LinkAction,
}

impl Related<super::link_action::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LinkAction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
