//! Plan Executor (spec.md §4.7): atomic per-action hardlink replacement
//! with pre-flight verification, backup/snapshot rollback, and
//! per-action progress.

use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{info, warn};

use crate::catalog::entities::{link_action, link_plan};
use crate::catalog::store::CatalogStore;
use crate::dedup::plan::external::{ExternalLinker, SnapshotCapability};
use crate::dedup::plan::verify::{self, VerifyMode};
use crate::error::{CatalogError, PlanError, PlanResult};

pub struct ExecuteOptions {
    pub dry_run: bool,
    pub verify_mode: VerifyMode,
    pub create_backup: bool,
    pub limit: Option<usize>,
    pub snapshot: bool,
    /// When set, applied to a duplicate before the existence/regularity
    /// check so read-only files don't fail atomic replace (supplemented
    /// permission-remediation sequencing).
    pub fixup_permissions: bool,
}

pub struct ActionProgress<'a> {
    pub index: usize,
    pub total: usize,
    pub action: &'a link_action::Model,
    pub status: &'static str,
    pub error: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct ExecutionSummary {
    pub executed: i64,
    pub failed: i64,
    pub skipped: i64,
    pub bytes_saved: i64,
}

/// Executes `plan_id`'s pending actions in descending `bytes_to_save`
/// order (spec.md §5 ordering guarantee).
pub async fn execute_plan(
    store: &CatalogStore,
    plan_id: i32,
    snapshot_dataset: Option<&str>,
    snapshot_prefix: &str,
    snapshot_cap: Option<&dyn SnapshotCapability>,
    options: ExecuteOptions,
    mut on_progress: Option<&mut dyn FnMut(ActionProgress<'_>)>,
) -> PlanResult<ExecutionSummary> {
    let plan = link_plan::Entity::find_by_id(plan_id)
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .ok_or(PlanError::NotFound(plan_id))?;

    let mut actions = link_action::Entity::find()
        .filter(link_action::Column::PlanId.eq(plan_id))
        .filter(link_action::Column::Status.eq("pending"))
        .order_by_desc(link_action::Column::BytesToSave)
        .all(store.conn())
        .await
        .map_err(CatalogError::Database)?;

    if let Some(limit) = options.limit {
        actions.truncate(limit);
    }

    let mount_point = PathBuf::from(&plan.mount_point);
    let mut snapshot_taken = false;

    if options.snapshot {
        if let (Some(dataset), Some(cap)) = (snapshot_dataset, snapshot_cap) {
            let label = format!("{snapshot_prefix}-plan{plan_id}-{}", Utc::now().timestamp());
            match cap.snapshot(dataset, &label).await {
                Ok(snapshot_id) => {
                    info!(plan_id, snapshot_id, "snapshot created; per-file backups suppressed");
                    snapshot_taken = true;
                }
                Err(err) => warn!(plan_id, error = %err, "snapshot failed, falling back to backups"),
            }
        }
    }
    let use_backup = options.create_backup && !snapshot_taken;

    mark_plan_in_progress(store, plan_id).await?;

    let total = actions.len();
    let mut summary = ExecutionSummary::default();
    let mut since_commit = 0u32;

    for (index, action) in actions.into_iter().enumerate() {
        let canonical = mount_point.join(&action.canonical_path);
        let duplicate = mount_point.join(&action.duplicate_path);

        let outcome = if options.dry_run {
            Ok(ActionOutcome::WouldExecute)
        } else {
            let expected_canonical = expected_stat(store, action.device_id, &action.canonical_path, action.file_size as u64).await?;
            let expected_duplicate = expected_stat(store, action.device_id, &action.duplicate_path, action.file_size as u64).await?;
            execute_one_action(
                &canonical,
                &duplicate,
                expected_canonical,
                expected_duplicate,
                &action.sha256,
                options.verify_mode,
                use_backup,
                options.fixup_permissions,
            )
            .await
        };

        let (status, error_message, bytes_saved) = match outcome {
            Ok(ActionOutcome::WouldExecute) => {
                summary.executed += 1;
                summary.bytes_saved += action.bytes_to_save;
                ("completed", None, action.bytes_to_save)
            }
            Ok(ActionOutcome::AlreadyLinked) => {
                summary.skipped += 1;
                ("skipped", None, 0)
            }
            Ok(ActionOutcome::Linked) => {
                summary.executed += 1;
                summary.bytes_saved += action.file_size;
                ("completed", None, action.file_size)
            }
            Err(err) => {
                summary.failed += 1;
                ("failed", Some(err.to_string()), 0)
            }
        };

        if let Some(cb) = on_progress.as_deref_mut() {
            cb(ActionProgress {
                index,
                total,
                action: &action,
                status,
                error: error_message.as_deref(),
            });
        }

        if !options.dry_run {
            let mut active: link_action::ActiveModel = action.into();
            active.status = Set(status.to_string());
            active.bytes_saved = Set(bytes_saved);
            active.error_message = Set(error_message);
            active.executed_at = Set(Some(Utc::now().into()));
            active.update(store.conn()).await.map_err(CatalogError::Database)?;
        }

        since_commit += 1;
        if since_commit >= 10 {
            recompute_plan_totals(store, plan_id).await?;
            since_commit = 0;
        }
    }

    recompute_plan_totals(store, plan_id).await?;
    finalize_plan_status(store, plan_id).await?;

    Ok(summary)
}

enum ActionOutcome {
    Linked,
    AlreadyLinked,
    WouldExecute,
}

/// Looks up the catalog's last-recorded size/mtime for `rel_path`,
/// falling back to the action's own recorded size if the row is gone
/// (spec.md §4.7 step 5 fast verify catalog expectations).
async fn expected_stat(
    store: &CatalogStore,
    device_id: i64,
    rel_path: &str,
    fallback_size: u64,
) -> Result<verify::ExpectedStat, PlanError> {
    let row = store.get_by_path(device_id, rel_path).await?;
    Ok(match row {
        Some(row) => verify::ExpectedStat {
            size: row.size as u64,
            mtime: row.mtime,
        },
        None => verify::ExpectedStat {
            size: fallback_size,
            mtime: f64::NAN,
        },
    })
}

async fn execute_one_action(
    canonical: &Path,
    duplicate: &Path,
    expected_canonical: verify::ExpectedStat,
    expected_duplicate: verify::ExpectedStat,
    expected_hash: &str,
    verify_mode: VerifyMode,
    use_backup: bool,
    fixup_permissions: bool,
) -> Result<ActionOutcome, PlanError> {
    if fixup_permissions {
        let _ = make_writable(duplicate).await;
    }

    for path in [canonical, duplicate] {
        let meta = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|source| fs_err(canonical, duplicate, source))?;
        if !meta.is_file() {
            return Err(PlanError::ExternalTool(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
    }

    let canonical_meta = tokio::fs::metadata(canonical)
        .await
        .map_err(|source| fs_err(canonical, duplicate, source))?;
    let duplicate_meta = tokio::fs::metadata(duplicate)
        .await
        .map_err(|source| fs_err(canonical, duplicate, source))?;

    if canonical_meta.dev() != duplicate_meta.dev() {
        return Err(PlanError::DeviceMismatch {
            canonical: canonical.display().to_string(),
            duplicate: duplicate.display().to_string(),
        });
    }

    if canonical_meta.ino() == duplicate_meta.ino() {
        return Ok(ActionOutcome::AlreadyLinked);
    }

    verify::verify(
        verify_mode,
        canonical,
        duplicate,
        expected_canonical,
        expected_duplicate,
        expected_hash,
    )
    .await?;

    atomic_replace(canonical, duplicate, use_backup).await?;
    Ok(ActionOutcome::Linked)
}

async fn atomic_replace(canonical: &Path, duplicate: &Path, use_backup: bool) -> Result<(), PlanError> {
    let backup = duplicate.with_extension(
        duplicate
            .extension()
            .map(|e| format!("{}.bak", e.to_string_lossy()))
            .unwrap_or_else(|| "bak".to_string()),
    );

    if use_backup {
        tokio::fs::hard_link(duplicate, &backup)
            .await
            .map_err(|source| fs_err(canonical, duplicate, source))?;
    }

    let unlink_result = tokio::fs::remove_file(duplicate).await;
    if let Err(source) = unlink_result {
        if use_backup {
            let _ = tokio::fs::remove_file(&backup).await;
        }
        return Err(fs_err(canonical, duplicate, source));
    }

    let link_result = tokio::fs::hard_link(canonical, duplicate).await;
    if let Err(source) = link_result {
        if use_backup {
            let _ = tokio::fs::hard_link(&backup, duplicate).await;
            let _ = tokio::fs::remove_file(&backup).await;
        }
        return Err(fs_err(canonical, duplicate, source));
    }

    if use_backup {
        let _ = tokio::fs::remove_file(&backup).await;
    }
    Ok(())
}

async fn make_writable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let meta = tokio::fs::metadata(path).await?;
    let mut perms = meta.permissions();
    perms.set_mode(perms.mode() | 0o200);
    tokio::fs::set_permissions(path, perms).await
}

fn fs_err(canonical: &Path, duplicate: &Path, source: std::io::Error) -> PlanError {
    PlanError::LinkFilesystem {
        canonical: canonical.display().to_string(),
        duplicate: duplicate.display().to_string(),
        source,
    }
}

/// Batch/group mode: hands a shared-hash group to an external
/// byte-for-byte linker (spec.md §4.7 "Batch / group mode").
pub async fn execute_group_with_external_linker(
    linker: &dyn ExternalLinker,
    canonical: &Path,
    duplicates: &[PathBuf],
    expected_hash: &str,
) -> PlanResult<HashMap<PathBuf, bool>> {
    for path in duplicates.iter().chain(std::iter::once(&canonical.to_path_buf())) {
        let meta = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|source| fs_err(canonical, path, source))?;
        if !meta.is_file() {
            return Err(PlanError::ExternalTool(format!("{} is not a regular file", path.display())));
        }
    }

    let results = linker
        .link_group(&canonical.to_path_buf(), duplicates, expected_hash)
        .await
        .map_err(PlanError::ExternalTool)?;

    Ok(results
        .into_iter()
        .map(|r| (r.path, r.now_shares_inode_with_canonical))
        .collect())
}

async fn mark_plan_in_progress(store: &CatalogStore, plan_id: i32) -> PlanResult<()> {
    let plan = link_plan::Entity::find_by_id(plan_id)
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .ok_or(PlanError::NotFound(plan_id))?;
    if plan.status == "pending" {
        let mut active: link_plan::ActiveModel = plan.into();
        active.status = Set("in_progress".to_string());
        active.updated_at = Set(Utc::now().into());
        active.update(store.conn()).await.map_err(CatalogError::Database)?;
    }
    Ok(())
}

async fn recompute_plan_totals(store: &CatalogStore, plan_id: i32) -> PlanResult<()> {
    let actions = link_action::Entity::find()
        .filter(link_action::Column::PlanId.eq(plan_id))
        .all(store.conn())
        .await
        .map_err(CatalogError::Database)?;

    let executed = actions.iter().filter(|a| a.status == "completed").count() as i64;
    let failed = actions.iter().filter(|a| a.status == "failed").count() as i64;
    let skipped = actions.iter().filter(|a| a.status == "skipped").count() as i64;
    let bytes_saved: i64 = actions
        .iter()
        .filter(|a| a.status == "completed")
        .map(|a| a.bytes_saved)
        .sum();

    let plan = link_plan::Entity::find_by_id(plan_id)
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .ok_or(PlanError::NotFound(plan_id))?;
    let mut active: link_plan::ActiveModel = plan.into();
    active.actions_executed = Set(executed);
    active.actions_failed = Set(failed);
    active.actions_skipped = Set(skipped);
    active.total_bytes_saved = Set(bytes_saved);
    active.updated_at = Set(Utc::now().into());
    active.update(store.conn()).await.map_err(CatalogError::Database)?;
    Ok(())
}

async fn finalize_plan_status(store: &CatalogStore, plan_id: i32) -> PlanResult<()> {
    let plan = link_plan::Entity::find_by_id(plan_id)
        .one(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .ok_or(PlanError::NotFound(plan_id))?;

    let pending_remaining = link_action::Entity::find()
        .filter(link_action::Column::PlanId.eq(plan_id))
        .filter(link_action::Column::Status.eq("pending"))
        .all(store.conn())
        .await
        .map_err(CatalogError::Database)?
        .len();

    let status = if pending_remaining > 0 {
        plan.status.clone()
    } else if plan.actions_failed > 0 {
        "failed".to_string()
    } else {
        "completed".to_string()
    };

    let mut active: link_plan::ActiveModel = plan.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().into());
    active.update(store.conn()).await.map_err(CatalogError::Database)?;
    Ok(())
}
