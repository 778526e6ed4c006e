//! Demotion planning and execution (spec.md §4.8 "Demotion planning" /
//! "Demotion execution"): move a payload from a source device to a
//! target device, gated by an external-consumer safety check.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::entities::{device, payload, torrent_instance};
use crate::catalog::store::CatalogStore;
use crate::dedup::plan::external::{ExternalLinker, SnapshotCapability};
use crate::error::{CatalogError, PayloadError, PayloadResult};
use crate::payload::torrent::{siblings, TorrentClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Block,
    Reuse,
    Move,
}

/// spec.md §6 "Plan JSON".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemotionPlan {
    pub version: u32,
    pub decision: Decision,
    pub torrent_hash: String,
    pub payload_id: i32,
    pub payload_hash: Option<String>,
    pub reasons: Vec<String>,
    pub affected_torrents: Vec<String>,
    pub source_path: String,
    pub target_path: Option<String>,
    pub file_count: i64,
    pub total_bytes: i64,
    pub source_device_id: i64,
    pub target_device_id: i64,
    pub seeding_roots: Vec<String>,
    pub view_targets: Option<Vec<String>>,
    pub payload_group: Option<Vec<String>>,
}

/// Builds a demotion plan for the payload backing `torrent_hash`, moving
/// it from `source_device_id` to `target_device_id` (spec.md §4.8 steps
/// 1-4).
pub async fn plan_demotion(
    store: &CatalogStore,
    torrent_hash: &str,
    source_device_id: i64,
    target_device_id: i64,
    seeding_roots: &[String],
    move_target_template: Option<&str>,
) -> PayloadResult<DemotionPlan> {
    let instance = torrent_instance::Entity::find_by_id(torrent_hash.to_string())
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .ok_or_else(|| PayloadError::NotFound {
            root_path: String::new(),
            device_id: source_device_id,
        })?;

    let payload_row = payload::Entity::find_by_id(instance.payload_id)
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .ok_or_else(|| PayloadError::NotFound {
            root_path: String::new(),
            device_id: source_device_id,
        })?;

    // Step 1: reject if not on the expected source device.
    if payload_row.device_id != source_device_id {
        return Ok(DemotionPlan {
            version: 1,
            decision: Decision::Block,
            torrent_hash: torrent_hash.to_string(),
            payload_id: payload_row.payload_id,
            payload_hash: payload_row.payload_hash.clone(),
            reasons: vec![format!(
                "payload {} is on device {}, not the expected source device {}",
                payload_row.payload_id, payload_row.device_id, source_device_id
            )],
            affected_torrents: vec![torrent_hash.to_string()],
            source_path: payload_row.root_path.clone(),
            target_path: None,
            file_count: payload_row.file_count,
            total_bytes: payload_row.total_bytes,
            source_device_id,
            target_device_id,
            seeding_roots: seeding_roots.to_vec(),
            view_targets: None,
            payload_group: None,
        });
    }

    // Step 2: every torrent instance sharing the payload's hash moves together.
    let affected_torrents = siblings(store, torrent_hash).await?;

    // Step 3: external-consumer check.
    device::Entity::find()
        .filter(device::Column::DeviceId.eq(source_device_id))
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .ok_or(CatalogError::InvalidDeviceId(source_device_id))?;

    let mut reasons = Vec::new();
    let rows = store.load_active_under_root(source_device_id, &payload_row.root_path).await?;
    for row in &rows {
        let siblings_by_inode = store.rows_for_inode(source_device_id, row.inode).await?;
        for sibling in &siblings_by_inode {
            if sibling.path == row.path {
                continue;
            }
            let under_seeding_root = seeding_roots
                .iter()
                .any(|root| sibling.path == *root || sibling.path.starts_with(&format!("{root}/")));
            if !under_seeding_root {
                reasons.push(format!(
                    "{} is hardlinked to {}, which is outside the seeding-domain roots",
                    row.path, sibling.path
                ));
            }
        }
    }

    if !reasons.is_empty() {
        return Ok(DemotionPlan {
            version: 1,
            decision: Decision::Block,
            torrent_hash: torrent_hash.to_string(),
            payload_id: payload_row.payload_id,
            payload_hash: payload_row.payload_hash.clone(),
            reasons,
            affected_torrents,
            source_path: payload_row.root_path.clone(),
            target_path: None,
            file_count: payload_row.file_count,
            total_bytes: payload_row.total_bytes,
            source_device_id,
            target_device_id,
            seeding_roots: seeding_roots.to_vec(),
            view_targets: None,
            payload_group: None,
        });
    }

    // Step 4: look for an existing payload with the same hash on the target.
    let target_existing = match &payload_row.payload_hash {
        Some(hash) => payload::Entity::find()
            .filter(payload::Column::DeviceId.eq(target_device_id))
            .filter(payload::Column::PayloadHash.eq(hash.clone()))
            .one(store.conn())
            .await
            .map_err(CatalogError::Database)?,
        None => None,
    };

    let (decision, target_path) = match target_existing {
        Some(target_payload) => (Decision::Reuse, Some(target_payload.root_path)),
        None => {
            let template = move_target_template.unwrap_or("{root_name}");
            let root_name = Path::new(&payload_row.root_path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| payload_row.root_path.clone());
            (Decision::Move, Some(template.replace("{root_name}", &root_name)))
        }
    };

    info!(torrent_hash, ?decision, "demotion plan built");

    Ok(DemotionPlan {
        version: 1,
        decision,
        torrent_hash: torrent_hash.to_string(),
        payload_id: payload_row.payload_id,
        payload_hash: payload_row.payload_hash.clone(),
        reasons: Vec::new(),
        affected_torrents,
        source_path: payload_row.root_path.clone(),
        target_path,
        file_count: payload_row.file_count,
        total_bytes: payload_row.total_bytes,
        source_device_id,
        target_device_id,
        seeding_roots: seeding_roots.to_vec(),
        view_targets: None,
        payload_group: None,
    })
}

/// Executes a previously-built demotion plan against a live torrent
/// client (spec.md §4.8 "Demotion execution").
pub async fn execute_demotion(
    store: &CatalogStore,
    client: &dyn TorrentClient,
    linker: Option<&dyn ExternalLinker>,
    snapshot_cap: Option<&dyn SnapshotCapability>,
    source_mount: &Path,
    target_mount: &Path,
    plan: &DemotionPlan,
) -> PayloadResult<()> {
    match plan.decision {
        Decision::Block => Err(PayloadError::Blocked(plan.reasons.join("; "))),
        Decision::Reuse => execute_reuse(store, client, linker, target_mount, plan).await,
        Decision::Move => execute_move(store, client, linker, snapshot_cap, source_mount, target_mount, plan).await,
    }
}

async fn execute_reuse(
    _store: &CatalogStore,
    client: &dyn TorrentClient,
    linker: Option<&dyn ExternalLinker>,
    target_mount: &Path,
    plan: &DemotionPlan,
) -> PayloadResult<()> {
    let Some(target_root) = &plan.target_path else {
        return Err(PayloadError::Blocked("no target root resolved for REUSE".to_string()));
    };
    let target_payload_root = target_mount.join(target_root);

    for torrent_hash in &plan.affected_torrents {
        construct_and_verify_view(client, linker, &target_payload_root, torrent_hash, plan).await?;
    }

    relocate_torrents(client, target_mount, plan).await
}

/// Mirrors a torrent's logical file tree under the existing target
/// payload, hardlinking via the external linker where a file isn't
/// already present, then checks the resulting file count and total
/// bytes against what the client reports for the torrent (spec.md
/// §4.8 "Demotion execution" REUSE: "construct ... torrent-view
/// directory ...; verify file count and total bytes").
async fn construct_and_verify_view(
    client: &dyn TorrentClient,
    linker: Option<&dyn ExternalLinker>,
    target_payload_root: &Path,
    torrent_hash: &str,
    plan: &DemotionPlan,
) -> PayloadResult<()> {
    let files = client
        .files_of(torrent_hash)
        .await
        .map_err(PayloadError::TorrentClient)?;
    let view_paths: Vec<PathBuf> = files.iter().map(|f| target_payload_root.join(&f.relpath)).collect();

    if let Some(linker) = linker {
        let _ = linker
            .link_group(
                &target_payload_root.to_path_buf(),
                &view_paths,
                plan.payload_hash.as_deref().unwrap_or_default(),
            )
            .await;
    }

    let mut actual_count = 0i64;
    let mut actual_bytes = 0i64;
    for path in &view_paths {
        let meta = tokio::fs::metadata(path).await.map_err(PayloadError::Io)?;
        actual_count += 1;
        actual_bytes += meta.len() as i64;
    }

    let expected_count = files.len() as i64;
    let expected_bytes: i64 = files.iter().map(|f| f.size).sum();
    if actual_count != expected_count || actual_bytes != expected_bytes {
        return Err(PayloadError::Blocked(format!(
            "torrent {torrent_hash} view under {} has {actual_count} files/{actual_bytes} bytes, expected {expected_count}/{expected_bytes}",
            target_payload_root.display()
        )));
    }
    Ok(())
}

async fn execute_move(
    _store: &CatalogStore,
    client: &dyn TorrentClient,
    _linker: Option<&dyn ExternalLinker>,
    snapshot_cap: Option<&dyn SnapshotCapability>,
    source_mount: &Path,
    target_mount: &Path,
    plan: &DemotionPlan,
) -> PayloadResult<()> {
    let Some(target_root) = &plan.target_path else {
        return Err(PayloadError::Blocked("no target path resolved for MOVE".to_string()));
    };
    let source_path = source_mount.join(&plan.source_path);
    let target_path = target_mount.join(target_root);

    let mut snapshotted = false;
    if let Some(cap) = snapshot_cap {
        let label = format!("demote-payload{}-{}", plan.payload_id, Utc::now().timestamp());
        if cap.snapshot(&plan.source_path, &label).await.is_ok() {
            snapshotted = true;
        }
    }

    if let Some(parent) = target_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(PayloadError::Io)?;
    }

    match tokio::fs::rename(&source_path, &target_path).await {
        Ok(()) => {}
        Err(rename_err) => {
            warn!(error = %rename_err, "cross-device rename failed, falling back to copy-then-delete");
            copy_tree(&source_path, &target_path).await.map_err(PayloadError::Io)?;
            tokio::fs::remove_dir_all(&source_path).await.map_err(PayloadError::Io)?;
        }
    }

    if let Err(err) = relocate_torrents(client, target_mount, plan).await {
        warn!(error = %err, "torrent relocation failed after MOVE; attempting to restore original location");
        if !snapshotted {
            let _ = tokio::fs::rename(&target_path, &source_path).await;
        }
        return Err(err);
    }

    Ok(())
}

/// Pauses, relocates, and resumes every affected torrent. On failure,
/// rolls back the torrents already relocated in this call — one at a
/// time, in reverse order — to each one's prior save path (spec.md
/// §4.8 "Demotion execution" REUSE: "rolls back location changes
/// torrent-by-torrent to the prior save path").
async fn relocate_torrents(client: &dyn TorrentClient, target_mount: &Path, plan: &DemotionPlan) -> PayloadResult<()> {
    let Some(target_root) = &plan.target_path else {
        return Err(PayloadError::Blocked("no target path for torrent relocation".to_string()));
    };
    let new_save_path = target_mount.join(target_root).to_string_lossy().to_string();

    let mut relocated: Vec<(String, String)> = Vec::new();

    for torrent_hash in &plan.affected_torrents {
        let prior_save_path = match client.info(torrent_hash).await {
            Ok(status) => status.save_path,
            Err(err) => {
                rollback_relocated(client, &relocated).await;
                return Err(PayloadError::TorrentClient(err));
            }
        };

        if let Err(err) = relocate_one(client, torrent_hash, &new_save_path).await {
            rollback_relocated(client, &relocated).await;
            return Err(err);
        }

        relocated.push((torrent_hash.clone(), prior_save_path));
    }
    Ok(())
}

async fn relocate_one(client: &dyn TorrentClient, torrent_hash: &str, new_save_path: &str) -> Result<(), PayloadError> {
    client
        .pause(torrent_hash)
        .await
        .map_err(PayloadError::TorrentClient)?;
    if let Err(err) = client.set_location(torrent_hash, new_save_path).await {
        let _ = client.resume(torrent_hash).await;
        return Err(PayloadError::TorrentClient(err));
    }
    client
        .resume(torrent_hash)
        .await
        .map_err(PayloadError::TorrentClient)?;

    let status = client.info(torrent_hash).await.map_err(PayloadError::TorrentClient)?;
    if status.save_path != new_save_path {
        return Err(PayloadError::TorrentClient(format!(
            "torrent {torrent_hash} reports save_path {}, expected {new_save_path}",
            status.save_path
        )));
    }
    Ok(())
}

async fn rollback_relocated(client: &dyn TorrentClient, relocated: &[(String, String)]) {
    for (torrent_hash, prior_save_path) in relocated.iter().rev() {
        if client.pause(torrent_hash).await.is_err() {
            continue;
        }
        if client.set_location(torrent_hash, prior_save_path).await.is_err() {
            let _ = client.resume(torrent_hash).await;
            continue;
        }
        let _ = client.resume(torrent_hash).await;
    }
}

async fn copy_tree(source: &Path, target: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(target).await?;
    let mut entries = tokio::fs::read_dir(source).await?;
    while let Some(entry) = entries.next_entry().await? {
        let dest = target.join(entry.file_name());
        let meta = entry.metadata().await?;
        if meta.is_dir() {
            Box::pin(copy_tree(&entry.path(), &dest)).await?;
        } else {
            tokio::fs::copy(entry.path(), &dest).await?;
        }
    }
    Ok(())
}
