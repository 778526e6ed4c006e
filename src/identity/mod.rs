//! Filesystem-identity oracle (spec.md §4.1).
//!
//! Maps a path to a stable filesystem identity. The Core only depends on
//! the contract below; OS-specific probe commands (`findmnt`, `zfs get`,
//! `stat -f`) are shelled out to the way the teacher's `volume::os_detection`
//! module shells out to `diskutil`/`df`, bounded by a short timeout and
//! degrading silently on any failure.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// ZFS-specific identity metadata, present only when the mount is a ZFS
/// dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZfsMeta {
    pub pool: String,
    pub dataset: String,
    pub pool_guid: String,
}

/// Result of resolving a path's filesystem identity (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsIdentity {
    /// Stable identity string: a UUID, `zfs-<guid>`, `dev-<kernel_id>`, or
    /// `dev-unknown` as a last resort. Never empty.
    pub fs_uuid: String,
    pub mount_point: PathBuf,
    pub mount_source: String,
    pub fs_type: String,
    pub zfs: Option<ZfsMeta>,
    /// Kernel-assigned device id (`st_dev`), used as a fallback identity
    /// tier and to detect cross-device entries during a walk.
    pub device_id: i64,
}

/// Resolves filesystem identity for a path. The production implementation
/// shells out to `findmnt`/`zfs`/`stat`; tests substitute a fake.
#[async_trait::async_trait]
pub trait FsIdentityOracle: Send + Sync {
    async fn resolve(&self, path: &Path) -> FsIdentity;
}

/// Default oracle, grounded on spec.md §4.1's resolution order:
/// stable-UUID probe → ZFS dataset GUID → `dev-<kernel_id>` → `dev-unknown`.
pub struct OsFsIdentityOracle;

#[async_trait::async_trait]
impl FsIdentityOracle for OsFsIdentityOracle {
    #[instrument(skip(self))]
    async fn resolve(&self, path: &Path) -> FsIdentity {
        let device_id = stat_device_id(path).unwrap_or(0);
        let mount_point = find_mount_point(path).await.unwrap_or_else(|| path.to_path_buf());
        let mount_source = findmnt_source(&mount_point).await.unwrap_or_default();
        let fs_type = stat_fs_type(&mount_point).await.unwrap_or_else(|| "unknown".to_string());

        let zfs = zfs_meta(&mount_point).await;

        let fs_uuid = if let Some(uuid) = findmnt_uuid(&mount_point).await {
            uuid
        } else if let Some(z) = &zfs {
            format!("zfs-{}", z.pool_guid)
        } else if device_id != 0 {
            format!("dev-{device_id}")
        } else {
            warn!("all identity probes failed for {:?}; falling back to dev-unknown", path);
            "dev-unknown".to_string()
        };

        FsIdentity {
            fs_uuid,
            mount_point,
            mount_source,
            fs_type,
            zfs,
            device_id,
        }
    }
}

#[cfg(unix)]
fn stat_device_id(path: &Path) -> Option<i64> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path).ok().map(|m| m.dev() as i64)
}

#[cfg(not(unix))]
fn stat_device_id(_path: &Path) -> Option<i64> {
    None
}

async fn run_probe(cmd: &str, args: &[&str]) -> Option<String> {
    let fut = Command::new(cmd).args(args).output();
    match timeout(PROBE_TIMEOUT, fut).await {
        Ok(Ok(output)) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        }
        Ok(Ok(output)) => {
            debug!(cmd, status = ?output.status, "probe exited non-zero");
            None
        }
        Ok(Err(e)) => {
            debug!(cmd, error = %e, "probe failed to launch");
            None
        }
        Err(_) => {
            warn!(cmd, "probe timed out after {:?}", PROBE_TIMEOUT);
            None
        }
    }
}

async fn find_mount_point(path: &Path) -> Option<PathBuf> {
    let p = path.to_string_lossy().to_string();
    run_probe("findmnt", &["-no", "TARGET", "-T", &p])
        .await
        .map(PathBuf::from)
}

async fn findmnt_source(mount_point: &Path) -> Option<String> {
    let p = mount_point.to_string_lossy().to_string();
    run_probe("findmnt", &["-no", "SOURCE", &p]).await
}

async fn findmnt_uuid(mount_point: &Path) -> Option<String> {
    let p = mount_point.to_string_lossy().to_string();
    run_probe("findmnt", &["-no", "UUID", &p]).await
}

async fn stat_fs_type(mount_point: &Path) -> Option<String> {
    let p = mount_point.to_string_lossy().to_string();
    run_probe("stat", &["-f", "-c", "%T", &p]).await
}

async fn zfs_meta(mount_point: &Path) -> Option<ZfsMeta> {
    let p = mount_point.to_string_lossy().to_string();
    let dataset = run_probe("zfs", &["list", "-H", "-o", "name", &p]).await?;
    let pool_guid = run_probe("zfs", &["get", "-H", "-o", "value", "guid", &dataset]).await?;
    let pool = dataset.split('/').next().unwrap_or(&dataset).to_string();
    Some(ZfsMeta {
        pool,
        dataset,
        pool_guid,
    })
}

/// Caches oracle results per canonicalized scan root for the session
/// (spec.md §4.1: "consulted once per scan root and cached for the session").
#[derive(Default)]
pub struct OracleCache {
    entries: tokio::sync::Mutex<std::collections::HashMap<PathBuf, FsIdentity>>,
}

impl OracleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &self,
        oracle: &dyn FsIdentityOracle,
        path: &Path,
    ) -> FsIdentity {
        let canonical = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());

        let mut entries = self.entries.lock().await;
        if let Some(identity) = entries.get(&canonical) {
            return identity.clone();
        }
        let identity = oracle.resolve(&canonical).await;
        entries.insert(canonical, identity.clone());
        identity
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// Fixed-answer oracle for unit tests that don't want to shell out.
    pub struct FakeOracle(pub FsIdentity);

    #[async_trait::async_trait]
    impl FsIdentityOracle for FakeOracle {
        async fn resolve(&self, _path: &Path) -> FsIdentity {
            self.0.clone()
        }
    }
}
