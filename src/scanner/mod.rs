//! The Scanner: walks a root, hashes changed content, and reconciles the
//! catalog against what it found (spec.md §4.3).

pub mod coordinator;
pub mod hash;
pub mod walk;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{info, warn};

use crate::catalog::device_registry;
use crate::catalog::files_table::FileRecord;
use crate::catalog::store::CatalogStore;
use crate::error::{ScanError, ScanResult};
use crate::identity::FsIdentityOracle;
use crate::telemetry::TelemetrySink;

pub use coordinator::CancellationFlag;

/// `hash_mode` as described in spec.md §4.3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashMode {
    /// Only the quick prefix hash is required for a changed file.
    Fast,
    /// Both full digests are required for a changed file.
    Full,
    /// Forces full-hash computation whenever either full hash is missing,
    /// even for otherwise-unchanged files.
    Upgrade,
}

pub struct ScanOptions {
    pub parallel: bool,
    pub workers: usize,
    pub batch_size: usize,
    pub hash_mode: HashMode,
    pub scan_nested_datasets: bool,
    pub max_inflight: usize,
}

#[derive(Debug, Default, Clone)]
pub struct ScanSummary {
    pub scanned: i64,
    pub added: i64,
    pub updated: i64,
    pub unchanged: i64,
    pub deleted: i64,
    pub bytes_hashed: i64,
    pub status: String,
}

/// Runs a full scan of `root_path` against the catalog (spec.md §4.3,
/// the eleven-step algorithm). `root_path` must already exist.
pub async fn scan(
    store: &CatalogStore,
    oracle: &dyn FsIdentityOracle,
    root_path: &Path,
    options: ScanOptions,
    cancel: CancellationFlag,
    telemetry: Option<&TelemetrySink>,
) -> ScanResult<ScanSummary> {
    let root_path = tokio::fs::canonicalize(root_path)
        .await
        .map_err(|source| ScanError::Io {
            path: root_path.display().to_string(),
            source,
        })?;

    // Step 1: resolve, register, open table, record root, begin session.
    let identity = oracle.resolve(&root_path).await;
    let device = device_registry::register_or_update_device(store.conn(), store.tables(), &identity)
        .await?;

    let rel_root = rel_root_under_mount(&root_path, &identity.mount_point);
    store.record_scan_root(&identity.fs_uuid, &rel_root).await?;

    // Advisory worker-count bias from prior throughput samples for this
    // device (SPEC_FULL.md §5.9); never changes correctness, only the
    // degree of hashing parallelism.
    let effective_workers = telemetry
        .map(|sink| sink.recommend_workers(device.device_id, options.workers))
        .unwrap_or(options.workers);

    let session = store
        .begin_scan_session(
            &identity.fs_uuid,
            device.device_id,
            &root_path.to_string_lossy(),
            options.parallel,
            effective_workers as i32,
        )
        .await?;
    let session_started_at = session.started_at;

    info!(
        root = %root_path.display(),
        device_id = device.device_id,
        rel_root = %rel_root,
        "scan starting"
    );

    // Step 2: snapshot existing catalog scoped to this root.
    let snapshot: HashMap<String, FileRecord> = store
        .snapshot_root(device.device_id, &rel_root)
        .await?
        .into_iter()
        .map(|row| (row.path.clone(), row))
        .collect();

    // Step 3-4: walk and coalesce by inode.
    let (entries, walk_stats) = walk::walk(&root_path, device.device_id).await?;
    if walk_stats.other_device_skipped > 0 {
        warn!(
            count = walk_stats.other_device_skipped,
            "skipped files on a different device during scan"
        );
    }
    let groups = walk::coalesce_by_inode(entries);

    // Step 5: per-representative change decision + hash-mode requirement.
    let mut work = Vec::new();
    let mut unchanged_count = 0i64;
    let mut unchanged_touch_paths = Vec::new();

    for group in groups {
        let rel_key = join_rel(&rel_root, &group.representative.rel_path);
        let catalog_entry = snapshot.get(&rel_key);
        match decide_work(catalog_entry, group.representative.size, group.representative.mtime, options.hash_mode) {
            Some(hash_work) => work.push((group, hash_work)),
            None => {
                unchanged_count += 1;
                for member in &group.members {
                    unchanged_touch_paths.push(join_rel(&rel_root, &member.rel_path));
                }
            }
        }
    }

    // Step 6-7: hash via the bounded coordinator; propagate across the
    // inode group, crediting bytes hashed once per group.
    let mut added = 0i64;
    let mut updated = 0i64;
    let mut bytes_hashed = 0i64;
    let mut seen_paths: HashSet<String> = unchanged_touch_paths.iter().cloned().collect();
    let mut batch: Vec<FileRecord> = Vec::new();
    let now = Utc::now();

    let max_inflight = options.max_inflight.max(effective_workers * 10).max(1);
    coordinator::run(work, max_inflight, cancel.clone(), |hashed| {
        if let Some(err) = &hashed.error {
            warn!(path = %hashed.group.representative.abs_path.display(), error = %err, "hash failed, skipping group");
            return;
        }
        bytes_hashed += hashed.bytes_hashed as i64;

        for (idx, member) in hashed.group.members.iter().enumerate() {
            let rel_key = join_rel(&rel_root, &member.rel_path);
            let existing = snapshot.get(&rel_key);
            if existing.is_some() {
                updated += 1;
            } else {
                added += 1;
            }

            let hash_source = if idx == 0 {
                "calculated".to_string()
            } else {
                format!("inode:{}", hashed.group.inode)
            };

            batch.push(FileRecord {
                path: rel_key.clone(),
                size: member.size as i64,
                mtime: member.mtime,
                quick_hash: hashed.quick_hash.clone().or_else(|| existing.and_then(|e| e.quick_hash.clone())),
                full_hash_primary: hashed.full_hash_primary.clone().or_else(|| existing.and_then(|e| e.full_hash_primary.clone())),
                full_hash_secondary: hashed.full_hash_secondary.clone().or_else(|| existing.and_then(|e| e.full_hash_secondary.clone())),
                hash_source,
                inode: member.inode as i64,
                first_seen_at: existing.map(|e| e.first_seen_at).unwrap_or(now),
                last_seen_at: now,
                last_modified_at: mtime_to_datetime(member.mtime),
                status: "active".to_string(),
                discovered_under: existing.map(|e| e.discovered_under.clone()).unwrap_or_else(|| rel_root.clone()),
            });
            seen_paths.insert(rel_key);
        }
    })
    .await;

    // Step 8: commit in batches.
    for chunk in batch.chunks(options.batch_size.max(1)) {
        store.commit_batch(device.device_id, chunk, &[]).await?;
    }
    if !unchanged_touch_paths.is_empty() {
        store
            .commit_batch(device.device_id, &[], &unchanged_touch_paths)
            .await?;
    }

    // Step 9: scoped deletion (skipped on a cancelled/interrupted scan so
    // partial walks never masquerade as completed reconciliation).
    let deleted = if cancel.is_cancelled() {
        0
    } else {
        store
            .mark_scoped_deletions(device.device_id, &rel_root, &seen_paths)
            .await?
    };

    let scanned = added + updated + unchanged_count;
    let status = if cancel.is_cancelled() { "interrupted" } else { "completed" };

    store
        .finalize_scan_session(session, status, scanned, added, updated, unchanged_count, deleted, bytes_hashed)
        .await?;

    if let Some(sink) = telemetry {
        let elapsed = (Utc::now() - session_started_at.with_timezone(&Utc)).num_milliseconds() as f64 / 1000.0;
        sink.record(device.device_id, effective_workers, scanned.max(0) as u64, bytes_hashed.max(0) as u64, elapsed);
    }

    info!(
        device_id = device.device_id,
        scanned, added, updated, unchanged = unchanged_count, deleted, bytes_hashed, status,
        "scan finished"
    );

    Ok(ScanSummary {
        scanned,
        added,
        updated,
        unchanged: unchanged_count,
        deleted,
        bytes_hashed,
        status: status.to_string(),
    })
}

fn decide_work(
    entry: Option<&FileRecord>,
    size: u64,
    mtime: f64,
    hash_mode: HashMode,
) -> Option<coordinator::HashWork> {
    let unchanged = entry
        .map(|e| e.size as u64 == size && (e.mtime - mtime).abs() < 0.001)
        .unwrap_or(false);

    if !unchanged {
        return Some(match hash_mode {
            HashMode::Full | HashMode::Upgrade => coordinator::HashWork::Full,
            HashMode::Fast => coordinator::HashWork::Quick,
        });
    }

    let entry = entry.expect("unchanged implies a prior entry");
    match hash_mode {
        HashMode::Fast => {
            if entry.quick_hash.is_none() {
                Some(coordinator::HashWork::Quick)
            } else {
                None
            }
        }
        HashMode::Full | HashMode::Upgrade => {
            if entry.full_hash_primary.is_none() || entry.full_hash_secondary.is_none() {
                Some(coordinator::HashWork::Full)
            } else {
                None
            }
        }
    }
}

fn rel_root_under_mount(root_path: &Path, mount_point: &Path) -> String {
    root_path
        .strip_prefix(mount_point)
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}

fn join_rel(rel_root: &str, rel_path: &str) -> String {
    if rel_root.is_empty() {
        rel_path.to_string()
    } else {
        format!("{rel_root}/{rel_path}")
    }
}

fn mtime_to_datetime(mtime: f64) -> DateTime<Utc> {
    let secs = mtime.trunc() as i64;
    let nanos = (mtime.fract() * 1_000_000_000.0) as u32;
    Utc.timestamp_opt(secs, nanos).single().unwrap_or_else(Utc::now)
}
