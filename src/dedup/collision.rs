//! Collision Resolver (spec.md §4.4): promotes quick-hash collisions to
//! full-hash identity on demand, idempotently.

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::info;

use crate::catalog::entities::device;
use crate::catalog::store::CatalogStore;
use crate::error::{CatalogError, ScanResult};
use crate::scanner::hash;

/// Progress callback invoked once per quick-hash group processed.
pub type ProgressFn<'a> = dyn FnMut(usize, usize) + Send + 'a;

/// For every quick-hash group on `device_id` with ≥ 2 distinct inodes,
/// computes full hashes for any inode not yet fully hashed and copies
/// them to every hardlinked row. Resumable: inodes that already carry
/// both full hashes are skipped.
pub async fn resolve_collisions(
    store: &CatalogStore,
    device_id: i64,
    mut on_progress: Option<&mut ProgressFn<'_>>,
) -> ScanResult<usize> {
    let device = device::Entity::find()
        .filter(device::Column::DeviceId.eq(device_id))
        .one(store.conn())
        .await
        .map_err(CatalogError::from)?
        .ok_or_else(|| CatalogError::DeviceNotFound(device_id.to_string()))?;
    let mount_point = std::path::PathBuf::from(&device.mount_point);

    let groups = store.quick_hash_collision_groups(device_id).await?;
    let total = groups.len();
    let mut promoted = 0usize;

    for (idx, group) in groups.into_iter().enumerate() {
        let quick_hash = group.group_key;
        let rows = rows_sharing_quick_hash(store, device_id, &quick_hash).await?;

        let mut by_inode: std::collections::HashMap<i64, Vec<_>> = std::collections::HashMap::new();
        for row in rows {
            by_inode.entry(row.inode).or_default().push(row);
        }

        for (_inode, members) in by_inode {
            let needs_full = members
                .iter()
                .any(|m| m.full_hash_primary.is_none() || m.full_hash_secondary.is_none());
            if !needs_full {
                continue;
            }

            let representative = &members[0];
            let path = mount_point.join(&representative.path);
            let full = hash::full_hash(&path).await;
            let Ok(full) = full else { continue };

            let mut updated = Vec::new();
            for (i, member) in members.iter().enumerate() {
                let mut row = member.clone();
                row.full_hash_primary = Some(full.full_hash_primary.clone());
                row.full_hash_secondary = Some(full.full_hash_secondary.clone());
                row.hash_source = if i == 0 {
                    "calculated".to_string()
                } else {
                    format!("inode:{}", member.inode)
                };
                updated.push(row);
            }
            store.commit_batch(device_id, &updated, &[]).await?;
            promoted += 1;
        }

        if let Some(cb) = on_progress.as_deref_mut() {
            cb(idx + 1, total);
        }
    }

    info!(device_id, promoted, "collision resolution complete");
    Ok(promoted)
}

async fn rows_sharing_quick_hash(
    store: &CatalogStore,
    device_id: i64,
    quick_hash: &str,
) -> ScanResult<Vec<crate::catalog::files_table::FileRecord>> {
    let all = store.load_active_under_root(device_id, "").await?;
    Ok(all
        .into_iter()
        .filter(|r| r.quick_hash.as_deref() == Some(quick_hash))
        .collect())
}
