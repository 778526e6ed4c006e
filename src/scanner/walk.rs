//! Filesystem walk and inode coalescing (spec.md §4.3 steps 3-4).

use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ScanError;

/// One observed file, relative to the scan root, with the metadata the
/// change-decision step needs.
#[derive(Clone, Debug)]
pub struct WalkEntry {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
    pub mtime: f64,
    pub inode: u64,
    pub device_id: i64,
}

#[derive(Default)]
pub struct WalkStats {
    pub other_device_skipped: u64,
    pub io_errors: u64,
}

/// Recursively walks `root`, skipping symlinks, and classifying entries
/// whose device id does not match `expected_device_id` as
/// skipped-other-device (spec.md §4.3 step 3). Returns paths relative to
/// `root`.
pub async fn walk(
    root: &Path,
    expected_device_id: i64,
) -> Result<(Vec<WalkEntry>, WalkStats), ScanError> {
    let mut entries = Vec::new();
    let mut stats = WalkStats::default();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(source) => {
                stats.io_errors += 1;
                debug!(path = %dir.display(), error = %source, "failed to read directory");
                continue;
            }
        };

        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    stats.io_errors += 1;
                    debug!(path = %dir.display(), error = %source, "failed to read directory entry");
                    break;
                }
            };

            let path = entry.path();
            let meta = match tokio::fs::symlink_metadata(&path).await {
                Ok(meta) => meta,
                Err(source) => {
                    stats.io_errors += 1;
                    debug!(path = %path.display(), error = %source, "stat failed");
                    continue;
                }
            };

            if meta.file_type().is_symlink() {
                trace!(path = %path.display(), "skipping symlink");
                continue;
            }

            if meta.is_dir() {
                stack.push(path);
                continue;
            }

            if !meta.is_file() {
                continue;
            }

            let device_id = meta.dev() as i64;
            if device_id != expected_device_id {
                stats.other_device_skipped += 1;
                trace!(path = %path.display(), device_id, expected_device_id, "skipping file on other device");
                continue;
            }

            let rel_path = match path.strip_prefix(root) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };

            entries.push(WalkEntry {
                rel_path,
                abs_path: path,
                size: meta.len(),
                mtime: meta.mtime() as f64 + meta.mtime_nsec() as f64 / 1_000_000_000.0,
                inode: meta.ino(),
                device_id,
            });
        }
    }

    Ok((entries, stats))
}

/// An inode group: all paths sharing a `(inode, size)` pair on the
/// scanned device. The first path encountered is the representative
/// (spec.md §4.3 step 4). Entries with inode `0` are single-member
/// groups keyed uniquely by path.
pub struct InodeGroup {
    pub inode: u64,
    pub size: u64,
    pub representative: WalkEntry,
    pub members: Vec<WalkEntry>,
}

pub fn coalesce_by_inode(entries: Vec<WalkEntry>) -> Vec<InodeGroup> {
    let mut groups: HashMap<(u64, u64), InodeGroup> = HashMap::new();
    let mut singleton_key = 0u64;

    for entry in entries {
        let key = if entry.inode == 0 {
            singleton_key += 1;
            (0, singleton_key)
        } else {
            (entry.inode, entry.size)
        };

        groups
            .entry(key)
            .and_modify(|group| group.members.push(entry.clone()))
            .or_insert_with(|| InodeGroup {
                inode: entry.inode,
                size: entry.size,
                representative: entry.clone(),
                members: vec![entry],
            });
    }

    groups.into_values().collect()
}
