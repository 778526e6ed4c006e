//! `scan_sessions` table (spec.md §3: ScanSession).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scan_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub scan_id: Uuid,

    pub fs_uuid: String,
    pub device_id: i64,
    pub root_path: String,

    pub started_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
    pub duration_seconds: Option<f64>,

    /// `running` | `completed` | `interrupted`.
    pub status: String,

    pub parallel: bool,
    pub workers: i32,

    pub scanned: i64,
    pub added: i64,
    pub updated: i64,
    pub unchanged: i64,
    pub deleted: i64,
    pub bytes_hashed: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
