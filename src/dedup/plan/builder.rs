//! Plan Builder (spec.md §4.6): canonical selection and hardlink action
//! generation from duplicate groups.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde_json::json;

use crate::catalog::entities::{link_action, link_plan};
use crate::catalog::store::CatalogStore;
use crate::dedup::analyzer::DuplicateGroup;
use crate::error::{CatalogError, CatalogResult};

/// One candidate member of a duplicate group, annotated with everything
/// the canonical-selection ranking needs.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: String,
    pub inode: i64,
}

/// Ranks candidates by (1) lowest inode, (2) shortest path, (3)
/// lexicographic path; the first-ranked path is canonical.
pub fn select_canonical(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.inode
            .cmp(&b.inode)
            .then_with(|| a.path.len().cmp(&b.path.len()))
            .then_with(|| a.path.cmp(&b.path))
    });
    candidates
}

/// Builds and persists a link plan from a device's duplicate groups
/// (spec.md §4.6). Returns the created plan's id.
pub async fn build_plan(
    store: &CatalogStore,
    device_id: i64,
    device_alias: &str,
    mount_point: &str,
    name: &str,
    groups: &[DuplicateGroup],
) -> CatalogResult<i32> {
    let txn = store.conn().begin().await.map_err(CatalogError::Database)?;
    let now = Utc::now();

    let total_opportunities = groups.len() as i64;
    let total_bytes_saveable: i64 = groups.iter().map(|g| g.potential_savings).sum();
    let actions_total: i64 = groups.iter().map(|g| g.member_count as i64 - 1).sum();

    let plan = link_plan::ActiveModel {
        name: Set(name.to_string()),
        status: Set("pending".to_string()),
        device_id: Set(device_id),
        device_alias: Set(device_alias.to_string()),
        mount_point: Set(mount_point.to_string()),
        total_opportunities: Set(total_opportunities),
        total_bytes_saveable: Set(total_bytes_saveable),
        total_bytes_saved: Set(0),
        actions_total: Set(actions_total),
        actions_executed: Set(0),
        actions_failed: Set(0),
        actions_skipped: Set(0),
        metadata: Set(json!({ "type": "duplicate-group-dedup" })),
        notes: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(CatalogError::Database)?;

    for group in groups {
        let candidates: Vec<Candidate> = group
            .paths
            .iter()
            .zip(group.inodes.iter())
            .map(|(path, inode)| Candidate {
                path: path.clone(),
                inode: *inode,
            })
            .collect();
        let ranked = select_canonical(candidates);
        let Some((canonical, duplicates)) = ranked.split_first() else { continue };

        for duplicate in duplicates {
            link_action::ActiveModel {
                plan_id: Set(plan.id),
                action_type: Set("HARDLINK".to_string()),
                status: Set("pending".to_string()),
                canonical_path: Set(canonical.path.clone()),
                duplicate_path: Set(duplicate.path.clone()),
                canonical_inode: Set(canonical.inode),
                duplicate_inode: Set(duplicate.inode),
                device_id: Set(device_id),
                file_size: Set(group.size),
                sha256: Set(group.hash.clone()),
                bytes_to_save: Set(group.size),
                bytes_saved: Set(0),
                executed_at: Set(None),
                error_message: Set(None),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(CatalogError::Database)?;
        }
    }

    txn.commit().await.map_err(CatalogError::Database)?;
    Ok(plan.id)
}

/// Specialized variant over zero-length files discovered through the
/// payload graph. Zero-byte files all share one trivial "content", so
/// canonical selection still applies, but the caller may require
/// evidence of a pre-existing cross-root hardlink before treating a
/// pair as safe to link (spec.md §4.6).
pub async fn build_zero_length_plan(
    store: &CatalogStore,
    device_id: i64,
    device_alias: &str,
    mount_point: &str,
    zero_length_paths: Vec<Candidate>,
    require_existing_hardlinks: bool,
) -> CatalogResult<i32> {
    let ranked = select_canonical(zero_length_paths);
    let group = DuplicateGroup {
        hash: blake3::hash(b"").to_hex().to_string(),
        size: 0,
        member_count: ranked.len(),
        unique_inodes: ranked
            .iter()
            .map(|c| c.inode)
            .collect::<std::collections::HashSet<_>>()
            .len() as i64,
        inodes: ranked.iter().map(|c| c.inode).collect(),
        paths: ranked.iter().map(|c| c.path.clone()).collect(),
        potential_savings: 0,
    };

    let filtered: Vec<Candidate> = if require_existing_hardlinks {
        ranked
            .into_iter()
            .filter(|c| group.inodes.iter().filter(|i| **i == c.inode).count() > 1)
            .collect()
    } else {
        ranked
    };
    if filtered.len() < 2 {
        return build_plan(store, device_id, device_alias, mount_point, "zero-length-files", &[])
            .await;
    }

    let txn = store.conn().begin().await.map_err(CatalogError::Database)?;
    let now = Utc::now();
    let plan = link_plan::ActiveModel {
        name: Set("zero-length-files".to_string()),
        status: Set("pending".to_string()),
        device_id: Set(device_id),
        device_alias: Set(device_alias.to_string()),
        mount_point: Set(mount_point.to_string()),
        total_opportunities: Set(1),
        total_bytes_saveable: Set(0),
        total_bytes_saved: Set(0),
        actions_total: Set(filtered.len() as i64 - 1),
        actions_executed: Set(0),
        actions_failed: Set(0),
        actions_skipped: Set(0),
        metadata: Set(json!({ "type": "zero-length-files", "require_existing_hardlinks": require_existing_hardlinks })),
        notes: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(CatalogError::Database)?;

    let (canonical, duplicates) = filtered.split_first().expect("checked len >= 2");
    for duplicate in duplicates {
        link_action::ActiveModel {
            plan_id: Set(plan.id),
            action_type: Set("HARDLINK".to_string()),
            status: Set("pending".to_string()),
            canonical_path: Set(canonical.path.clone()),
            duplicate_path: Set(duplicate.path.clone()),
            canonical_inode: Set(canonical.inode),
            duplicate_inode: Set(duplicate.inode),
            device_id: Set(device_id),
            file_size: Set(0),
            sha256: Set(group.hash.clone()),
            bytes_to_save: Set(0),
            bytes_saved: Set(0),
            executed_at: Set(None),
            error_message: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(CatalogError::Database)?;
    }

    txn.commit().await.map_err(CatalogError::Database)?;
    Ok(plan.id)
}
