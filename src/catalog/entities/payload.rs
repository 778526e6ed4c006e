//! `payloads` table (spec.md §3: Payload).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payloads")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub payload_id: i32,

    /// Null until every file under `root_path` has a full hash.
    pub payload_hash: Option<String>,

    pub device_id: i64,
    pub root_path: String,

    pub file_count: i64,
    pub total_bytes: i64,

    /// `complete` | `incomplete`.
    pub status: String,
    pub last_built_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::torrent_instance::Entity")]
    TorrentInstance,
}

impl Related<super::torrent_instance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TorrentInstance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
