//! Deterministic payload hashing (spec.md §4.8 "Payload build").

use crate::catalog::store::CatalogStore;
use crate::error::CatalogResult;

#[derive(Debug, Clone)]
pub struct PayloadBuild {
    pub payload_hash: Option<String>,
    pub file_count: i64,
    pub total_bytes: i64,
}

/// Collects the active files under `(device_id, root_path)` and computes
/// the canonical payload hash, or `None` if any member lacks a full hash.
pub async fn build_payload_hash(
    store: &CatalogStore,
    device_id: i64,
    root_path: &str,
) -> CatalogResult<PayloadBuild> {
    let rows = store.load_active_under_root(device_id, root_path).await?;

    let file_count = rows.len() as i64;
    let total_bytes: i64 = rows.iter().map(|r| r.size).sum();

    let mut triples: Vec<(String, i64, String)> = Vec::with_capacity(rows.len());
    let mut complete = true;
    for row in &rows {
        match &row.full_hash_primary {
            Some(hash) => {
                let relpath = relative_to(root_path, &row.path);
                triples.push((relpath, row.size, hash.clone()));
            }
            None => {
                complete = false;
                break;
            }
        }
    }

    let payload_hash = if complete && !triples.is_empty() {
        triples.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        let mut buf = String::new();
        for (relpath, size, hash) in &triples {
            buf.push_str(relpath);
            buf.push('|');
            buf.push_str(&size.to_string());
            buf.push('|');
            buf.push_str(hash);
            buf.push('\n');
        }
        Some(blake3::hash(buf.as_bytes()).to_hex().to_string())
    } else {
        None
    };

    Ok(PayloadBuild {
        payload_hash,
        file_count,
        total_bytes,
    })
}

/// Strips `root_path` from a catalog-relative `path`, so the hash is
/// invariant to where the payload's root sits under the device mount.
fn relative_to(root_path: &str, path: &str) -> String {
    if root_path.is_empty() {
        return path.to_string();
    }
    path.strip_prefix(root_path)
        .map(|rest| rest.trim_start_matches('/').to_string())
        .unwrap_or_else(|| path.to_string())
}
