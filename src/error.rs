//! Error taxonomy for the catalog, scanner, dedup, and payload subsystems.
//!
//! Mirrors the propagation-policy barrier in SPEC_FULL.md §7: everything
//! below a component boundary is recovered locally or turned into a
//! row-level status; everything above sees one of these enums plus an
//! optional diagnostic string.

use thiserror::Error;

/// Errors raised while registering devices or mutating catalog-wide state.
/// Fatal to the enclosing operation (spec.md §7: CatalogError).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("per-device files table for device {device_id} already exists under the target name; rename skipped")]
    TableRenameCollision { device_id: i64 },

    #[error("path {path} is not under mount point {mount_point}")]
    PathNotUnderMount { path: String, mount_point: String },

    #[error("invalid device_id: {0}")]
    InvalidDeviceId(i64),

    #[error("could not find a free alias derived from {0:?} after 1000 attempts")]
    AliasExhausted(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors surfaced by the filesystem-identity oracle. Never fatal: every
/// variant here is caught by the oracle itself and degraded to a lower
/// identity tier before it escapes (spec.md §7: IdentityProbeError).
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("probe timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("probe command failed: {0}")]
    ProbeFailed(String),

    #[error("path does not exist: {0}")]
    PathNotFound(String),
}

/// Per-file errors encountered during a scan. Logged and counted, never
/// abort the scan (spec.md §7: ScanIoError / DeviceMismatch).
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file {path} is on a different device (expected {expected}, found {found})")]
    DeviceMismatch {
        path: String,
        expected: i64,
        found: i64,
    },

    #[error("scan was cancelled")]
    Cancelled,
}

pub type ScanResult<T> = Result<T, ScanError>;

/// Errors raised while building or executing a link plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("plan {0} not found")]
    NotFound(i32),

    #[error("hash mismatch on {path}: catalog expected {expected}, disk has {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("filesystem error linking {canonical} -> {duplicate}: {source}")]
    LinkFilesystem {
        canonical: String,
        duplicate: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cross-device link rejected: {canonical} and {duplicate} are on different devices")]
    DeviceMismatch { canonical: String, duplicate: String },

    #[error("external tool error: {0}")]
    ExternalTool(String),
}

pub type PlanResult<T> = Result<T, PlanError>;

/// Errors raised while building or executing payload/demotion plans.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("payload not found for root {root_path} on device {device_id}")]
    NotFound { root_path: String, device_id: i64 },

    #[error("demotion blocked: {0}")]
    Blocked(String),

    #[error("torrent client error: {0}")]
    TorrentClient(String),

    #[error("filesystem error during relocation: {0}")]
    Io(#[from] std::io::Error),
}

pub type PayloadResult<T> = Result<T, PayloadError>;
