//! Pre-flight verification modes for the Plan Executor (spec.md §4.7
//! step 5).

use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::error::PlanError;

const SAMPLE_BYTES: u64 = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyMode {
    None,
    Fast,
    Paranoid,
}

impl VerifyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyMode::None => "none",
            VerifyMode::Fast => "fast",
            VerifyMode::Paranoid => "paranoid",
        }
    }
}

/// Expected size/mtime for one side of a verify pair, as last recorded
/// in the catalog (spec.md §4.7 step 5 fast verify).
#[derive(Clone, Copy, Debug)]
pub struct ExpectedStat {
    pub size: u64,
    pub mtime: f64,
}

/// Verifies `canonical` and `duplicate` agree, per `mode`, against the
/// catalog's expected `size`/`mtime`/`full_hash`. Returns `Ok(())` when
/// verification passes or is skipped; `Err` otherwise.
pub async fn verify(
    mode: VerifyMode,
    canonical: &Path,
    duplicate: &Path,
    expected_canonical: ExpectedStat,
    expected_duplicate: ExpectedStat,
    expected_full_hash: &str,
) -> Result<(), PlanError> {
    match mode {
        VerifyMode::None => Ok(()),
        VerifyMode::Fast => {
            verify_fast(canonical, duplicate, expected_canonical, expected_duplicate).await
        }
        VerifyMode::Paranoid => verify_paranoid(canonical, duplicate, expected_full_hash).await,
    }
}

async fn verify_fast(
    canonical: &Path,
    duplicate: &Path,
    expected_canonical: ExpectedStat,
    expected_duplicate: ExpectedStat,
) -> Result<(), PlanError> {
    for (path, expected) in [(canonical, expected_canonical), (duplicate, expected_duplicate)] {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|source| link_fs_err(canonical, duplicate, source))?;
        if meta.len() != expected.size {
            return Err(PlanError::HashMismatch {
                path: path.display().to_string(),
                expected: expected.size.to_string(),
                actual: meta.len().to_string(),
            });
        }
        if expected.mtime.is_nan() {
            continue;
        }
        let actual_mtime = meta
            .modified()
            .map_err(|source| link_fs_err(canonical, duplicate, source))?
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        if (actual_mtime - expected.mtime).abs() >= 0.001 {
            return Err(PlanError::HashMismatch {
                path: path.display().to_string(),
                expected: format!("mtime {}", expected.mtime),
                actual: format!("mtime {actual_mtime}"),
            });
        }
    }

    let offsets = sample_offsets(expected_canonical.size);
    let canonical_samples = sample_at(canonical, &offsets).await?;
    let duplicate_samples = sample_at(duplicate, &offsets).await?;

    if canonical_samples != duplicate_samples {
        return Err(PlanError::HashMismatch {
            path: duplicate.display().to_string(),
            expected: "matching sample bytes".to_string(),
            actual: "sample mismatch".to_string(),
        });
    }
    Ok(())
}

async fn verify_paranoid(
    canonical: &Path,
    duplicate: &Path,
    expected_full_hash: &str,
) -> Result<(), PlanError> {
    let canonical_hash = crate::scanner::hash::full_hash(canonical)
        .await
        .map_err(|_| PlanError::ExternalTool(format!("failed to hash {}", canonical.display())))?;
    let duplicate_hash = crate::scanner::hash::full_hash(duplicate)
        .await
        .map_err(|_| PlanError::ExternalTool(format!("failed to hash {}", duplicate.display())))?;

    if canonical_hash.full_hash_primary != expected_full_hash {
        return Err(PlanError::HashMismatch {
            path: canonical.display().to_string(),
            expected: expected_full_hash.to_string(),
            actual: canonical_hash.full_hash_primary,
        });
    }
    if duplicate_hash.full_hash_primary != expected_full_hash {
        return Err(PlanError::HashMismatch {
            path: duplicate.display().to_string(),
            expected: expected_full_hash.to_string(),
            actual: duplicate_hash.full_hash_primary,
        });
    }
    Ok(())
}

/// Three 1 MiB sample offsets: start, middle, end (spec.md §4.7 step 5).
fn sample_offsets(size: u64) -> [u64; 3] {
    let mid = size.saturating_sub(SAMPLE_BYTES) / 2;
    let end = size.saturating_sub(SAMPLE_BYTES);
    [0, mid, end]
}

async fn sample_at(path: &Path, offsets: &[u64; 3]) -> Result<Vec<Vec<u8>>, PlanError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|source| link_fs_err(path, path, source))?;
    let mut samples = Vec::with_capacity(3);
    for &offset in offsets {
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|source| link_fs_err(path, path, source))?;
        let mut buf = vec![0u8; SAMPLE_BYTES as usize];
        let mut total = 0usize;
        loop {
            let n = file
                .read(&mut buf[total..])
                .await
                .map_err(|source| link_fs_err(path, path, source))?;
            if n == 0 {
                break;
            }
            total += n;
            if total == buf.len() {
                break;
            }
        }
        buf.truncate(total);
        samples.push(buf);
    }
    Ok(samples)
}

fn link_fs_err(canonical: &Path, duplicate: &Path, source: std::io::Error) -> PlanError {
    PlanError::LinkFilesystem {
        canonical: canonical.display().to_string(),
        duplicate: duplicate.display().to_string(),
        source,
    }
}
