//! Dedup Analyzer (spec.md §4.5): enumerates duplicate groups from
//! full-hash collisions within a device, or across devices by hash+size
//! alone.

use crate::catalog::store::CatalogStore;
use crate::error::ScanResult;

/// A set of files sharing a full content hash and size, occupying more
/// than one distinct inode.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub hash: String,
    pub size: i64,
    pub member_count: usize,
    pub unique_inodes: i64,
    pub inodes: Vec<i64>,
    pub paths: Vec<String>,
    pub potential_savings: i64,
}

/// Per-device duplicate groups, filtered by `min_size`, sorted by
/// `potential_savings` descending (spec.md §4.5).
pub async fn analyze_device(
    store: &CatalogStore,
    device_id: i64,
    min_size: i64,
) -> ScanResult<Vec<DuplicateGroup>> {
    let groups = store.full_hash_duplicate_groups(device_id, min_size).await?;
    let mut results = Vec::with_capacity(groups.len());

    for group in groups {
        let hash = group.group_key;
        let rows = store.rows_for_full_hash(device_id, &hash, group.size).await?;
        let inodes: Vec<i64> = rows.iter().map(|r| r.inode).collect();
        let paths: Vec<String> = rows.iter().map(|r| r.path.clone()).collect();
        let unique_inodes = group.distinct_inodes;

        results.push(DuplicateGroup {
            hash,
            size: group.size,
            member_count: rows.len(),
            unique_inodes,
            inodes,
            paths,
            potential_savings: (unique_inodes - 1) * group.size,
        });
    }

    results.sort_by(|a, b| b.potential_savings.cmp(&a.potential_savings));
    Ok(results)
}

/// Cross-device variant: groups purely by `(hash, size)` with no inode
/// comparison, since members live on different devices and can never
/// become hardlinks of one another. Per spec.md §9 open question, these
/// are surfaced only as reports — not fed to the plan builder.
#[derive(Debug, Clone)]
pub struct CrossDeviceGroup {
    pub hash: String,
    pub size: i64,
    pub devices: Vec<(i64, String)>,
}

pub async fn analyze_cross_device(
    stores: &[(i64, &CatalogStore)],
    min_size: i64,
) -> ScanResult<Vec<CrossDeviceGroup>> {
    use std::collections::HashMap;

    let mut by_hash: HashMap<(String, i64), Vec<(i64, String)>> = HashMap::new();

    for (device_id, store) in stores {
        let groups = store.full_hash_duplicate_groups(*device_id, min_size).await?;
        for group in groups {
            let hash = group.group_key;
            let rows = store.rows_for_full_hash(*device_id, &hash, group.size).await?;
            for row in rows {
                by_hash
                    .entry((hash.clone(), group.size))
                    .or_default()
                    .push((*device_id, row.path));
            }
        }
    }

    let mut results: Vec<CrossDeviceGroup> = by_hash
        .into_iter()
        .filter(|(_, members)| {
            members
                .iter()
                .map(|(device_id, _)| *device_id)
                .collect::<std::collections::HashSet<_>>()
                .len()
                > 1
        })
        .map(|((hash, size), devices)| CrossDeviceGroup { hash, size, devices })
        .collect();

    results.sort_by(|a, b| b.size.cmp(&a.size));
    Ok(results)
}
