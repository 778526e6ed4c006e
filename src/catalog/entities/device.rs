//! `devices` table (spec.md §3: Device).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "devices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Stable filesystem identity; the true key other components key off.
    #[sea_orm(unique)]
    pub fs_uuid: String,

    /// Kernel-assigned device id; may change across remounts.
    #[sea_orm(unique)]
    pub device_id: i64,

    #[sea_orm(unique)]
    pub alias: String,

    pub mount_point: String,
    pub preferred_mount_point: String,
    pub fs_type: String,

    pub zfs_pool_name: Option<String>,
    pub zfs_dataset_name: Option<String>,
    pub zfs_pool_guid: Option<String>,

    pub first_scanned_at: DateTimeUtc,
    pub last_scanned_at: DateTimeUtc,
    pub scan_count: i32,

    pub total_files: i64,
    pub total_bytes: i64,

    /// JSON array of `{device_id, changed_at}`, append-only.
    pub device_id_history: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
