//! Shared fixtures for integration tests: an in-memory catalog and a
//! fake filesystem-identity oracle that reports a fixed identity without
//! shelling out to `findmnt`/`zfs`.

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use hoard_catalog::catalog::migration::Migrator;
use hoard_catalog::catalog::store::CatalogStore;
use hoard_catalog::identity::{FsIdentity, FsIdentityOracle};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;

pub struct FakeOracle {
    pub fs_uuid: String,
}

#[async_trait::async_trait]
impl FsIdentityOracle for FakeOracle {
    async fn resolve(&self, path: &Path) -> FsIdentity {
        let device_id = std::fs::metadata(path).map(|m| m.dev() as i64).unwrap_or(0);
        FsIdentity {
            fs_uuid: self.fs_uuid.clone(),
            mount_point: path.to_path_buf(),
            mount_source: "test".to_string(),
            fs_type: "tmpfs".to_string(),
            zfs: None,
            device_id,
        }
    }
}

pub async fn open_memory_catalog() -> CatalogStore {
    let conn = Database::connect("sqlite::memory:").await.expect("open in-memory sqlite");
    Migrator::up(&conn, None).await.expect("run migrations");
    CatalogStore::new(conn)
}

pub fn write_file(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}
