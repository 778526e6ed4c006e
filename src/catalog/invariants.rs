//! Read-only invariant checks against a live catalog (spec.md §8
//! quantified invariants), grounded on `invariant_checks.py`. Not part of
//! the production hot path — used by integration tests and optional
//! diagnostics.

use sea_orm::{ConnectionTrait, DatabaseBackend, FromQueryResult, Statement};

use crate::catalog::files_table::table_name;
use crate::error::{CatalogError, CatalogResult};

/// A single invariant-check violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub invariant: &'static str,
    pub detail: String,
}

#[derive(FromQueryResult)]
struct CountRow {
    count: i64,
}

#[derive(FromQueryResult)]
struct GroupRow {
    group_key: Option<String>,
    distinct_hashes: i64,
    calculated_count: i64,
}

/// Invariant 2 (spec.md §8): within a hardlink group (same inode), all
/// rows share identical `quick_hash`/full-hash columns, and exactly one
/// row is `hash_source=calculated`.
pub async fn check_hardlink_group_consistency<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
) -> CatalogResult<Vec<Violation>> {
    let table = table_name(device_id);
    let sql = format!(
        "SELECT CAST(inode AS TEXT) AS group_key,
                COUNT(DISTINCT quick_hash || '|' || COALESCE(full_hash_primary, '')) AS distinct_hashes,
                SUM(CASE WHEN hash_source = 'calculated' THEN 1 ELSE 0 END) AS calculated_count
         FROM \"{table}\"
         WHERE status = 'active'
         GROUP BY inode
         HAVING COUNT(*) > 1"
    );

    let rows = GroupRow::find_by_statement(Statement::from_string(DatabaseBackend::Sqlite, sql))
        .all(conn)
        .await
        .map_err(CatalogError::from)?;

    let mut violations = Vec::new();
    for row in rows {
        let inode = row.group_key.unwrap_or_default();
        if row.distinct_hashes > 1 {
            violations.push(Violation {
                invariant: "hardlink-group-same-hash",
                detail: format!("inode {inode} has {} distinct hash values", row.distinct_hashes),
            });
        }
        if row.calculated_count != 1 {
            violations.push(Violation {
                invariant: "hardlink-group-one-calculated",
                detail: format!(
                    "inode {inode} has {} rows with hash_source=calculated (expected 1)",
                    row.calculated_count
                ),
            });
        }
    }
    Ok(violations)
}

/// Invariant 3 (spec.md §8): for a `completed` plan,
/// `actions_executed + actions_failed + actions_skipped = actions_total`
/// and `total_bytes_saved` matches the sum of completed actions'
/// `bytes_saved`.
pub async fn check_completed_plan_totals<C: ConnectionTrait>(
    conn: &C,
    plan_id: i32,
) -> CatalogResult<Vec<Violation>> {
    let sql = "SELECT
            p.actions_executed + p.actions_failed + p.actions_skipped - p.actions_total AS count
         FROM link_plans p
         WHERE p.id = ? AND p.status = 'completed'";
    let row = CountRow::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        sql,
        [plan_id.into()],
    ))
    .one(conn)
    .await
    .map_err(CatalogError::from)?;

    let mut violations = Vec::new();
    if let Some(row) = row {
        if row.count != 0 {
            violations.push(Violation {
                invariant: "plan-action-count-balance",
                detail: format!("plan {plan_id}: executed+failed+skipped != total (off by {})", row.count),
            });
        }
    }

    let bytes_sql = "SELECT
            (SELECT total_bytes_saved FROM link_plans WHERE id = ?) -
            (SELECT COALESCE(SUM(bytes_saved), 0) FROM link_actions WHERE plan_id = ? AND status = 'completed')
            AS count";
    let bytes_row = CountRow::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        bytes_sql,
        [plan_id.into(), plan_id.into()],
    ))
    .one(conn)
    .await
    .map_err(CatalogError::from)?;

    if let Some(row) = bytes_row {
        if row.count != 0 {
            violations.push(Violation {
                invariant: "plan-bytes-saved-balance",
                detail: format!(
                    "plan {plan_id}: total_bytes_saved disagrees with sum of completed actions' bytes_saved (off by {})",
                    row.count
                ),
            });
        }
    }

    Ok(violations)
}

/// Invariant 5 (spec.md §8): a scan of root `R` never changes `status`
/// for a path that is not under `R`. Checked by comparing `last_seen_at`
/// timestamps: no row outside `rel_root` should carry the session's
/// finalize timestamp as its `last_seen_at` unless it was also touched.
pub async fn check_scoped_deletion<C: ConnectionTrait>(
    conn: &C,
    device_id: i64,
    rel_root: &str,
    scan_finalized_at: chrono::DateTime<chrono::Utc>,
) -> CatalogResult<Vec<Violation>> {
    let table = table_name(device_id);
    let prefix = format!("{rel_root}/%");
    let sql = format!(
        "SELECT COUNT(*) AS count FROM \"{table}\"
         WHERE status = 'deleted'
           AND last_seen_at = ?
           AND NOT (path = ? OR path LIKE ?)"
    );
    let row = CountRow::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        sql,
        [
            scan_finalized_at.to_rfc3339().into(),
            rel_root.into(),
            prefix.into(),
        ],
    ))
    .one(conn)
    .await
    .map_err(CatalogError::from)?;

    let mut violations = Vec::new();
    if let Some(row) = row {
        if row.count > 0 {
            violations.push(Violation {
                invariant: "scoped-deletion",
                detail: format!(
                    "{} rows outside root {rel_root} were marked deleted by this scan",
                    row.count
                ),
            });
        }
    }
    Ok(violations)
}
