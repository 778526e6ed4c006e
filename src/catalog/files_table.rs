//! The per-device `files_<device_id>` table.
//!
//! sea-orm's `DeriveEntityModel` binds a table name at compile time; the
//! name here is synthesized per device at runtime, so this module is a
//! hand-rolled row codec over raw parameterized `Statement`s instead
//! (spec.md §9 design note on per-device table names).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseBackend, FromQueryResult, Statement};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{CatalogError, CatalogResult};

/// A row of a device's files table (spec.md §3: FileRecord).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct FileRecord {
    pub path: String,
    pub size: i64,
    pub mtime: f64,
    pub quick_hash: Option<String>,
    pub full_hash_primary: Option<String>,
    pub full_hash_secondary: Option<String>,
    pub hash_source: String,
    pub inode: i64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    /// `active` | `deleted`.
    pub status: String,
    pub discovered_under: String,
}

/// Group produced by a quick-hash or full-hash collision query.
#[derive(Clone, Debug, FromQueryResult)]
pub struct InodeCollisionGroup {
    pub group_key: String,
    pub size: i64,
    pub distinct_inodes: i64,
}

/// Remembers which per-device tables exist and have had their DDL/indexes
/// applied, so repeated access doesn't reissue `CREATE TABLE IF NOT EXISTS`.
/// Invalidated on device-id-change rename.
pub struct FilesTableRegistry {
    ensured: Mutex<HashSet<i64>>,
}

impl FilesTableRegistry {
    pub fn new() -> Self {
        Self {
            ensured: Mutex::new(HashSet::new()),
        }
    }

    pub async fn ensure<C: ConnectionTrait>(&self, conn: &C, device_id: i64) -> CatalogResult<()> {
        let mut ensured = self.ensured.lock().await;
        if ensured.contains(&device_id) {
            return Ok(());
        }
        create_files_table(conn, device_id).await?;
        ensured.insert(device_id);
        Ok(())
    }

    /// Called after a files table is renamed for a `device_id` change.
    pub async fn invalidate(&self, old_device_id: i64, new_device_id: i64) {
        let mut ensured = self.ensured.lock().await;
        ensured.remove(&old_device_id);
        ensured.insert(new_device_id);
    }
}

pub fn table_name(device_id: i64) -> String {
    format!("files_{device_id}")
}

async fn create_files_table<C: ConnectionTrait>(conn: &C, device_id: i64) -> CatalogResult<()> {
    let table = table_name(device_id);

    conn.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                path TEXT PRIMARY KEY,
                size INTEGER NOT NULL,
                mtime REAL NOT NULL,
                quick_hash TEXT,
                full_hash_primary TEXT,
                full_hash_secondary TEXT,
                hash_source TEXT NOT NULL,
                inode INTEGER NOT NULL,
                first_seen_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL,
                last_modified_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                discovered_under TEXT NOT NULL
            )"
        ),
    ))
    .await?;

    for (name, col) in [
        ("quick_hash", "quick_hash"),
        ("full_hash_primary", "full_hash_primary"),
        ("full_hash_secondary", "full_hash_secondary"),
        ("inode", "inode"),
        ("status", "status"),
    ] {
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            format!("CREATE INDEX IF NOT EXISTS idx_{table}_{name} ON \"{table}\" ({col})"),
        ))
        .await?;
    }

    Ok(())
}

/// Renames a device's files table in place, used when `device_id` changes
/// for an existing `fs_uuid`. Returns `Ok(false)` without renaming if the
/// target name is already taken (spec.md §4.2: leave both tables, surface
/// a warning — the caller logs it).
pub async fn rename_table<C: ConnectionTrait>(
    conn: &C,
    old_device_id: i64,
    new_device_id: i64,
) -> CatalogResult<bool> {
    let old = table_name(old_device_id);
    let new = table_name(new_device_id);

    if table_exists(conn, &new).await? {
        return Ok(false);
    }

    conn.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        format!("ALTER TABLE \"{old}\" RENAME TO \"{new}\""),
    ))
    .await?;

    Ok(true)
}

async fn table_exists<C: ConnectionTrait>(conn: &C, table: &str) -> CatalogResult<bool> {
    let row = conn
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "SELECT name FROM sqlite_master WHERE type='table' AND name = ?",
            [table.into()],
        ))
        .await?;
    Ok(row.is_some())
}

/// Upserts a batch of rows keyed by `path`. Callers are expected to wrap
/// calls across a batch boundary in a transaction (spec.md §4.2d).
pub async fn upsert_batch<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
    rows: &[FileRecord],
) -> CatalogResult<()> {
    let table = table_name(device_id);
    for row in rows {
        conn.execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            format!(
                "INSERT INTO \"{table}\"
                    (path, size, mtime, quick_hash, full_hash_primary, full_hash_secondary,
                     hash_source, inode, first_seen_at, last_seen_at, last_modified_at,
                     status, discovered_under)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(path) DO UPDATE SET
                    size = excluded.size,
                    mtime = excluded.mtime,
                    quick_hash = excluded.quick_hash,
                    full_hash_primary = excluded.full_hash_primary,
                    full_hash_secondary = excluded.full_hash_secondary,
                    hash_source = excluded.hash_source,
                    inode = excluded.inode,
                    last_seen_at = excluded.last_seen_at,
                    last_modified_at = excluded.last_modified_at,
                    status = excluded.status"
            ),
            [
                row.path.clone().into(),
                row.size.into(),
                row.mtime.into(),
                row.quick_hash.clone().into(),
                row.full_hash_primary.clone().into(),
                row.full_hash_secondary.clone().into(),
                row.hash_source.clone().into(),
                row.inode.into(),
                row.first_seen_at.to_rfc3339().into(),
                row.last_seen_at.to_rfc3339().into(),
                row.last_modified_at.to_rfc3339().into(),
                row.status.clone().into(),
                row.discovered_under.clone().into(),
            ],
        ))
        .await
        .map_err(CatalogError::from)?;
    }
    Ok(())
}

/// Touches `last_seen_at` for paths observed unchanged, without touching
/// hashes (spec.md §4.3 step 8: "touched" rows).
pub async fn touch_seen<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
    paths: &[String],
    seen_at: DateTime<Utc>,
) -> CatalogResult<()> {
    let table = table_name(device_id);
    for path in paths {
        conn.execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            format!("UPDATE \"{table}\" SET last_seen_at = ? WHERE path = ?"),
            [seen_at.to_rfc3339().into(), path.clone().into()],
        ))
        .await?;
    }
    Ok(())
}

/// Loads all `active` rows whose path is exactly `rel_root` or lies under
/// `rel_root/` (spec.md §4.2a). An empty `rel_root` loads every active row.
pub async fn load_active_under_root<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
    rel_root: &str,
) -> CatalogResult<Vec<FileRecord>> {
    let table = table_name(device_id);
    let sql = format!(
        "SELECT path, size, mtime, quick_hash, full_hash_primary, full_hash_secondary,
                hash_source, inode, first_seen_at, last_seen_at, last_modified_at,
                status, discovered_under
         FROM \"{table}\"
         WHERE status = 'active' AND (? = '' OR path = ? OR path LIKE ?)"
    );
    let prefix = format!("{rel_root}/%");
    let rows = FileRecord::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        sql,
        [rel_root.into(), rel_root.into(), prefix.into()],
    ))
    .all(conn)
    .await
    .map_err(CatalogError::from)?;
    Ok(rows)
}

/// Quick-hash groups with ≥ 2 distinct inodes (spec.md §4.2b, §4.4).
pub async fn quick_hash_collision_groups<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
) -> CatalogResult<Vec<InodeCollisionGroup>> {
    let table = table_name(device_id);
    let sql = format!(
        "SELECT quick_hash AS group_key, 0 AS size, COUNT(DISTINCT inode) AS distinct_inodes
         FROM \"{table}\"
         WHERE status = 'active' AND quick_hash IS NOT NULL
         GROUP BY quick_hash
         HAVING COUNT(DISTINCT inode) >= 2"
    );
    let rows = InodeCollisionGroup::find_by_statement(Statement::from_string(
        DatabaseBackend::Sqlite,
        sql,
    ))
    .all(conn)
    .await
    .map_err(CatalogError::from)?;
    Ok(rows)
}

/// Full-hash, same-size groups with ≥ 2 distinct inodes (spec.md §4.2c,
/// §4.5 Dedup Analyzer).
pub async fn full_hash_duplicate_groups<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
    min_size: i64,
) -> CatalogResult<Vec<InodeCollisionGroup>> {
    let table = table_name(device_id);
    let sql = format!(
        "SELECT full_hash_primary AS group_key, size, COUNT(DISTINCT inode) AS distinct_inodes
         FROM \"{table}\"
         WHERE status = 'active' AND full_hash_primary IS NOT NULL AND size >= ?
         GROUP BY full_hash_primary, size
         HAVING COUNT(DISTINCT inode) >= 2"
    );
    let rows = InodeCollisionGroup::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        sql,
        [min_size.into()],
    ))
    .all(conn)
    .await
    .map_err(CatalogError::from)?;
    Ok(rows)
}

/// All active rows sharing a `full_hash_primary` + `size`, used by the
/// plan builder to enumerate group members.
pub async fn rows_for_full_hash<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
    full_hash_primary: &str,
    size: i64,
) -> CatalogResult<Vec<FileRecord>> {
    let table = table_name(device_id);
    let sql = format!(
        "SELECT path, size, mtime, quick_hash, full_hash_primary, full_hash_secondary,
                hash_source, inode, first_seen_at, last_seen_at, last_modified_at,
                status, discovered_under
         FROM \"{table}\"
         WHERE status = 'active' AND full_hash_primary = ? AND size = ?"
    );
    let rows = FileRecord::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        sql,
        [full_hash_primary.into(), size.into()],
    ))
    .all(conn)
    .await
    .map_err(CatalogError::from)?;
    Ok(rows)
}

/// All active rows sharing `inode`, used by the demotion planner's
/// external-consumer check (spec.md §4.8 "Demotion planning" step 3).
pub async fn rows_for_inode<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
    inode: i64,
) -> CatalogResult<Vec<FileRecord>> {
    let table = table_name(device_id);
    let sql = format!(
        "SELECT path, size, mtime, quick_hash, full_hash_primary, full_hash_secondary,
                hash_source, inode, first_seen_at, last_seen_at, last_modified_at,
                status, discovered_under
         FROM \"{table}\"
         WHERE status = 'active' AND inode = ?"
    );
    let rows = FileRecord::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        sql,
        [inode.into()],
    ))
    .all(conn)
    .await
    .map_err(CatalogError::from)?;
    Ok(rows)
}

/// Looks up a single active row by its exact `path` (spec.md §4.7 step 5
/// fast verify: compares catalog-recorded size/mtime against the file
/// actually on disk before sample-hashing).
pub async fn get_by_path<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
    path: &str,
) -> CatalogResult<Option<FileRecord>> {
    let table = table_name(device_id);
    let sql = format!(
        "SELECT path, size, mtime, quick_hash, full_hash_primary, full_hash_secondary,
                hash_source, inode, first_seen_at, last_seen_at, last_modified_at,
                status, discovered_under
         FROM \"{table}\"
         WHERE status = 'active' AND path = ?"
    );
    let row = FileRecord::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        sql,
        [path.into()],
    ))
    .one(conn)
    .await
    .map_err(CatalogError::from)?;
    Ok(row)
}

/// Marks every active row not present in `seen_paths` as `deleted`,
/// scoped to `rel_root` (spec.md §4.3 step 9).
pub async fn mark_scoped_deletions<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
    rel_root: &str,
    seen_paths: &HashSet<String>,
    seen_at: DateTime<Utc>,
) -> CatalogResult<i64> {
    let candidates = load_active_under_root(conn, device_id, rel_root).await?;
    let mut deleted = 0i64;
    let table = table_name(device_id);
    for row in candidates {
        if seen_paths.contains(&row.path) {
            continue;
        }
        conn.execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            format!("UPDATE \"{table}\" SET status = 'deleted', last_seen_at = ? WHERE path = ?"),
            [seen_at.to_rfc3339().into(), row.path.into()],
        ))
        .await?;
        deleted += 1;
    }
    Ok(deleted)
}
