//! `scan_roots` table (spec.md §3: ScanRoot).
//!
//! Composite primary key `(fs_uuid, root_path)` tracks which relative-path
//! subtrees have ever been scanned on a device.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scan_roots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub fs_uuid: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub root_path: String,

    pub last_scanned_at: DateTimeUtc,
    pub scan_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
