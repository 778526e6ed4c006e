//! High-level catalog operations used by the scanner, dedup, and payload
//! subsystems (spec.md §4.2 query contracts).

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::catalog::entities::{scan_root, scan_session};
use crate::catalog::files_table::{self, FileRecord, FilesTableRegistry, InodeCollisionGroup};
use crate::error::{CatalogError, CatalogResult};

/// Facade over the catalog connection plus the per-device files-table
/// registry; this is the dependency every other component takes instead
/// of a process-global handle (spec.md §9 design note).
pub struct CatalogStore {
    conn: DatabaseConnection,
    tables: FilesTableRegistry,
}

impl CatalogStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            tables: FilesTableRegistry::new(),
        }
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn tables(&self) -> &FilesTableRegistry {
        &self.tables
    }

    pub async fn record_scan_root(&self, fs_uuid: &str, root_path: &str) -> CatalogResult<()> {
        let now = Utc::now();
        let existing = scan_root::Entity::find()
            .filter(scan_root::Column::FsUuid.eq(fs_uuid))
            .filter(scan_root::Column::RootPath.eq(root_path))
            .one(&self.conn)
            .await?;

        match existing {
            Some(row) => {
                let mut active: scan_root::ActiveModel = row.into();
                active.scan_count = Set(active.scan_count.unwrap() + 1);
                active.last_scanned_at = Set(now.into());
                active.update(&self.conn).await?;
            }
            None => {
                let active = scan_root::ActiveModel {
                    fs_uuid: Set(fs_uuid.to_string()),
                    root_path: Set(root_path.to_string()),
                    last_scanned_at: Set(now.into()),
                    scan_count: Set(1),
                };
                active.insert(&self.conn).await?;
            }
        }
        Ok(())
    }

    pub async fn begin_scan_session(
        &self,
        fs_uuid: &str,
        device_id: i64,
        root_path: &str,
        parallel: bool,
        workers: i32,
    ) -> CatalogResult<scan_session::Model> {
        let active = scan_session::ActiveModel {
            scan_id: Set(Uuid::new_v4()),
            fs_uuid: Set(fs_uuid.to_string()),
            device_id: Set(device_id),
            root_path: Set(root_path.to_string()),
            started_at: Set(Utc::now().into()),
            completed_at: Set(None),
            duration_seconds: Set(None),
            status: Set("running".to_string()),
            parallel: Set(parallel),
            workers: Set(workers),
            scanned: Set(0),
            added: Set(0),
            updated: Set(0),
            unchanged: Set(0),
            deleted: Set(0),
            bytes_hashed: Set(0),
            ..Default::default()
        };
        Ok(active.insert(&self.conn).await?)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn finalize_scan_session(
        &self,
        session: scan_session::Model,
        status: &str,
        scanned: i64,
        added: i64,
        updated: i64,
        unchanged: i64,
        deleted: i64,
        bytes_hashed: i64,
    ) -> CatalogResult<scan_session::Model> {
        let started_at = session.started_at;
        let mut active: scan_session::ActiveModel = session.into();
        let now = Utc::now();
        active.completed_at = Set(Some(now.into()));
        active.duration_seconds = Set(Some(
            (now - started_at.with_timezone(&Utc)).num_milliseconds() as f64 / 1000.0,
        ));
        active.status = Set(status.to_string());
        active.scanned = Set(scanned);
        active.added = Set(added);
        active.updated = Set(updated);
        active.unchanged = Set(unchanged);
        active.deleted = Set(deleted);
        active.bytes_hashed = Set(bytes_hashed);
        Ok(active.update(&self.conn).await?)
    }

    /// Atomically upserts a batch of rows in one transaction (spec.md
    /// §4.2d). `commit_unchanged` also touches `last_seen_at` for rows
    /// whose metadata and hashes did not change.
    pub async fn commit_batch(
        &self,
        device_id: i64,
        upserts: &[FileRecord],
        touched_unchanged: &[String],
    ) -> CatalogResult<()> {
        self.tables.ensure(&self.conn, device_id).await?;
        let txn = self.conn.begin().await.map_err(CatalogError::Database)?;
        files_table::upsert_batch(&txn, device_id, upserts).await?;
        if !touched_unchanged.is_empty() {
            files_table::touch_seen(&txn, device_id, touched_unchanged, Utc::now()).await?;
        }
        txn.commit().await.map_err(CatalogError::Database)?;
        Ok(())
    }

    pub async fn mark_scoped_deletions(
        &self,
        device_id: i64,
        rel_root: &str,
        seen_paths: &std::collections::HashSet<String>,
    ) -> CatalogResult<i64> {
        files_table::mark_scoped_deletions(&self.conn, device_id, rel_root, seen_paths, Utc::now())
            .await
    }

    pub async fn load_active_under_root(
        &self,
        device_id: i64,
        rel_root: &str,
    ) -> CatalogResult<Vec<FileRecord>> {
        files_table::load_active_under_root(&self.conn, device_id, rel_root).await
    }

    pub async fn get_by_path(&self, device_id: i64, path: &str) -> CatalogResult<Option<FileRecord>> {
        files_table::get_by_path(&self.conn, device_id, path).await
    }

    pub async fn quick_hash_collision_groups(
        &self,
        device_id: i64,
    ) -> CatalogResult<Vec<InodeCollisionGroup>> {
        files_table::quick_hash_collision_groups(&self.conn, device_id).await
    }

    pub async fn full_hash_duplicate_groups(
        &self,
        device_id: i64,
        min_size: i64,
    ) -> CatalogResult<Vec<InodeCollisionGroup>> {
        files_table::full_hash_duplicate_groups(&self.conn, device_id, min_size).await
    }

    pub async fn rows_for_full_hash(
        &self,
        device_id: i64,
        full_hash_primary: &str,
        size: i64,
    ) -> CatalogResult<Vec<FileRecord>> {
        files_table::rows_for_full_hash(&self.conn, device_id, full_hash_primary, size).await
    }

    /// All active rows sharing `inode` on `device_id`.
    pub async fn rows_for_inode(&self, device_id: i64, inode: i64) -> CatalogResult<Vec<FileRecord>> {
        files_table::rows_for_inode(&self.conn, device_id, inode).await
    }

    /// Active rows ordered by path, used when snapshotting a scan root
    /// into the in-memory pre-scan map (spec.md §4.3 step 2).
    pub async fn snapshot_root(
        &self,
        device_id: i64,
        rel_root: &str,
    ) -> CatalogResult<Vec<FileRecord>> {
        let mut rows = self.load_active_under_root(device_id, rel_root).await?;
        rows.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(rows)
    }
}
