//! Torrent-client capability and payload binding (spec.md §4.8 "Torrent
//! binding", §6 torrent-client interface). The transport itself is out
//! of scope; only the trait boundary lives here (spec.md §1 Non-goals).

use std::path::Path;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, JoinType, QueryFilter, QuerySelect, RelationTrait, Set};

use crate::catalog::entities::{payload, torrent_instance};
use crate::catalog::store::CatalogStore;
use crate::error::{CatalogError, PayloadError, PayloadResult};
use crate::payload::hash::build_payload_hash;

#[derive(Debug, Clone, Default)]
pub struct TorrentFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TorrentInfo {
    pub hash: String,
    pub name: String,
    pub save_path: String,
    pub content_path: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TorrentFile {
    pub relpath: String,
    pub size: i64,
}

#[derive(Debug, Clone)]
pub struct TorrentStatus {
    pub save_path: String,
}

/// Implementation-agnostic view of the torrent client (spec.md §6).
/// Credentials are bound once at construction; every call returns
/// success or a failure reason, never an exception crossing the
/// boundary.
#[async_trait::async_trait]
pub trait TorrentClient: Send + Sync {
    async fn list_torrents(&self, filter: TorrentFilter) -> Result<Vec<TorrentInfo>, String>;
    async fn files_of(&self, hash: &str) -> Result<Vec<TorrentFile>, String>;
    async fn pause(&self, hash: &str) -> Result<(), String>;
    async fn set_location(&self, hash: &str, new_save_path: &str) -> Result<(), String>;
    async fn resume(&self, hash: &str) -> Result<(), String>;
    async fn info(&self, hash: &str) -> Result<TorrentStatus, String>;
}

/// For one torrent instance: derives its payload root under `mount_point`,
/// looks up or builds the payload row, then upserts the torrent row
/// (spec.md §4.8 "Torrent binding").
pub async fn bind_torrent(
    store: &CatalogStore,
    device_id: i64,
    mount_point: &Path,
    info: &TorrentInfo,
) -> PayloadResult<torrent_instance::Model> {
    let content_path = Path::new(&info.content_path);
    let root_path = content_path
        .strip_prefix(mount_point)
        .unwrap_or(content_path)
        .to_string_lossy()
        .trim_matches('/')
        .to_string();

    let existing = payload::Entity::find()
        .filter(payload::Column::DeviceId.eq(device_id))
        .filter(payload::Column::RootPath.eq(root_path.clone()))
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?;

    let payload_row = match existing {
        Some(row) => row,
        None => {
            let build = build_payload_hash(store, device_id, &root_path).await?;
            let status = if build.payload_hash.is_some() { "complete" } else { "incomplete" };
            payload::ActiveModel {
                payload_hash: Set(build.payload_hash),
                device_id: Set(device_id),
                root_path: Set(root_path.clone()),
                file_count: Set(build.file_count),
                total_bytes: Set(build.total_bytes),
                status: Set(status.to_string()),
                last_built_at: Set(Utc::now().into()),
                ..Default::default()
            }
            .insert(store.conn())
            .await
            .map_err(CatalogError::Database)?
        }
    };

    let root_name = content_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let existing_instance = torrent_instance::Entity::find_by_id(info.hash.clone())
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?;

    let tags = if info.tags.is_empty() {
        None
    } else {
        Some(info.tags.join(","))
    };

    let model = match existing_instance {
        Some(row) => {
            let mut active: torrent_instance::ActiveModel = row.into();
            active.payload_id = Set(payload_row.payload_id);
            active.device_id = Set(device_id);
            active.save_path = Set(info.save_path.clone());
            active.root_name = Set(root_name);
            active.category = Set(info.category.clone());
            active.tags = Set(tags);
            active.last_seen_at = Set(Utc::now().into());
            active.update(store.conn()).await.map_err(CatalogError::Database)?
        }
        None => torrent_instance::ActiveModel {
            torrent_hash: Set(info.hash.clone()),
            payload_id: Set(payload_row.payload_id),
            device_id: Set(device_id),
            save_path: Set(info.save_path.clone()),
            root_name: Set(root_name),
            category: Set(info.category.clone()),
            tags: Set(tags),
            last_seen_at: Set(Utc::now().into()),
        }
        .insert(store.conn())
        .await
        .map_err(CatalogError::Database)?,
    };

    Ok(model)
}

/// Every torrent hash whose payload hash matches `torrent_hash`'s payload
/// (spec.md §4.8 "siblings").
pub async fn siblings(store: &CatalogStore, torrent_hash: &str) -> PayloadResult<Vec<String>> {
    let instance = torrent_instance::Entity::find_by_id(torrent_hash.to_string())
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .ok_or_else(|| PayloadError::NotFound {
            root_path: String::new(),
            device_id: 0,
        })?;

    let payload_row = payload::Entity::find_by_id(instance.payload_id)
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .ok_or_else(|| PayloadError::NotFound {
            root_path: String::new(),
            device_id: instance.device_id,
        })?;

    let Some(payload_hash) = payload_row.payload_hash else {
        return Ok(vec![torrent_hash.to_string()]);
    };

    let siblings = torrent_instance::Entity::find()
        .join(JoinType::InnerJoin, torrent_instance::Relation::Payload.def())
        .filter(payload::Column::PayloadHash.eq(payload_hash))
        .all(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .into_iter()
        .map(|t| t.torrent_hash)
        .collect();

    Ok(siblings)
}
