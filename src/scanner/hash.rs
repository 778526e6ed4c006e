//! Content hashing (spec.md §4.3 step 6): a quick prefix digest and two
//! independent full-content digests computed in one streaming pass.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, BufReader};

use crate::error::ScanError;

/// Size of the prefix sampled for `quick_hash`.
pub const QUICK_HASH_SAMPLE_BYTES: usize = 1024 * 1024;

const STREAM_CHUNK_BYTES: usize = 256 * 1024;

/// Result of hashing a file's full content.
pub struct FullHash {
    pub full_hash_primary: String,
    pub full_hash_secondary: String,
    pub bytes_read: u64,
}

/// Digest of the first `QUICK_HASH_SAMPLE_BYTES` bytes of `path`.
pub async fn quick_hash(path: &Path) -> Result<String, ScanError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| io_err(path, source))?;
    let mut reader = BufReader::new(file);

    let mut buf = vec![0u8; QUICK_HASH_SAMPLE_BYTES];
    let mut total = 0usize;
    loop {
        let n = reader
            .read(&mut buf[total..])
            .await
            .map_err(|source| io_err(path, source))?;
        if n == 0 {
            break;
        }
        total += n;
        if total == buf.len() {
            break;
        }
    }
    buf.truncate(total);

    Ok(blake3::hash(&buf).to_hex().to_string())
}

/// Computes `full_hash_primary` (BLAKE3) and `full_hash_secondary`
/// (SHA-256) of `path`'s entire content in a single streaming pass.
pub async fn full_hash(path: &Path) -> Result<FullHash, ScanError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| io_err(path, source))?;
    let mut reader = BufReader::new(file);

    let mut primary = blake3::Hasher::new();
    let mut secondary = Sha256::new();
    let mut buf = vec![0u8; STREAM_CHUNK_BYTES];
    let mut bytes_read = 0u64;

    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|source| io_err(path, source))?;
        if n == 0 {
            break;
        }
        primary.update(&buf[..n]);
        secondary.update(&buf[..n]);
        bytes_read += n as u64;
    }

    Ok(FullHash {
        full_hash_primary: primary.finalize().to_hex().to_string(),
        full_hash_secondary: hex::encode(secondary.finalize()),
        bytes_read,
    })
}

fn io_err(path: &Path, source: std::io::Error) -> ScanError {
    ScanError::Io {
        path: path.display().to_string(),
        source,
    }
}
