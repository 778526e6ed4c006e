//! `torrent_instances` table (spec.md §3: TorrentInstance).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "torrent_instances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub torrent_hash: String,

    pub payload_id: i32,
    pub device_id: i64,

    pub save_path: String,
    pub root_name: String,
    pub category: Option<String>,
    /// Comma-joined tag list; the external client's own representation.
    pub tags: Option<String>,

    pub last_seen_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payload::Entity",
        from = "Column::PayloadId",
        to = "super::payload::Column::PayloadId"
    )]
    Payload,
}

impl Related<super::payload::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payload.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
