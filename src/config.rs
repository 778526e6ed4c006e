//! Crate-wide configuration.
//!
//! Mirrors `AppConfig` in the teacher (`config/app_config.rs`): a single
//! serde-derived struct loaded from a TOML file with environment overrides,
//! rather than hand-parsed flags. Argument parsing and interactive
//! rendering belong to the CLI collaborator and are out of scope here
//! (spec.md §1); this module only owns the values spec.md §6 calls
//! "environment-controlled behavior".

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_quick_hash_sample_bytes() -> u64 {
    1024 * 1024
}

fn default_fast_verify_sample_bytes() -> u64 {
    1024 * 1024
}

fn default_batch_size() -> usize {
    500
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_snapshot_prefix() -> String {
    "hoard".to_string()
}

fn default_min_planning_size() -> u64 {
    1
}

fn default_max_inflight_factor() -> usize {
    10
}

/// Top-level configuration for the catalog, scanner, dedup, and payload
/// subsystems. Loaded once and passed explicitly to every component
/// (spec.md §9: "avoid any process-global handle").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Path to the SQLite catalog file.
    pub catalog_path: PathBuf,

    /// Bytes sampled from the start of a file for `quick_hash`.
    #[serde(default = "default_quick_hash_sample_bytes")]
    pub quick_hash_sample_bytes: u64,

    /// Bytes sampled per offset during `verify_mode = fast` (spec.md §4.7).
    #[serde(default = "default_fast_verify_sample_bytes")]
    pub fast_verify_sample_bytes: u64,

    /// Rows per catalog batch commit (scanner and executor).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Default hashing worker count; adaptive selection may bias this per
    /// device based on telemetry.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Multiplier applied to `worker_count` to derive the coordinator's
    /// bounded in-flight task set (spec.md §4.3: `max_inflight ≈ workers × 10`).
    #[serde(default = "default_max_inflight_factor")]
    pub max_inflight_factor: usize,

    /// Prefix used when naming ZFS snapshots taken before plan execution.
    #[serde(default = "default_snapshot_prefix")]
    pub snapshot_prefix: String,

    /// Minimum file size considered by the dedup analyzer / plan builder.
    #[serde(default = "default_min_planning_size")]
    pub min_planning_size: u64,

    /// Filesystem subtrees (relative to a device's effective mount) inside
    /// which a payload's hardlinks are considered internal. Any hardlink
    /// outside these roots blocks demotion (spec.md GLOSSARY: seeding root).
    #[serde(default)]
    pub seeding_roots: Vec<String>,

    /// Template for MOVE target paths, e.g. `"{alias}/incoming/{root_name}"`.
    #[serde(default)]
    pub move_target_template: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("catalog.db"),
            quick_hash_sample_bytes: default_quick_hash_sample_bytes(),
            fast_verify_sample_bytes: default_fast_verify_sample_bytes(),
            batch_size: default_batch_size(),
            worker_count: default_worker_count(),
            max_inflight_factor: default_max_inflight_factor(),
            snapshot_prefix: default_snapshot_prefix(),
            min_planning_size: default_min_planning_size(),
            seeding_roots: Vec::new(),
            move_target_template: None,
        }
    }
}

const ENV_PREFIX: &str = "HOARD_";

impl CoreConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any field the file omits, then applies `HOARD_<FIELD>` environment
    /// overrides (spec.md §6 "Environment-controlled behavior").
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: CoreConfig = toml::from_str(&text)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Overlays `HOARD_<FIELD>` environment variables onto an
    /// already-loaded config, e.g. `HOARD_WORKER_COUNT=8`.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Some(v) = env_var("CATALOG_PATH") {
            self.catalog_path = PathBuf::from(v);
        }
        if let Some(v) = env_parse("QUICK_HASH_SAMPLE_BYTES")? {
            self.quick_hash_sample_bytes = v;
        }
        if let Some(v) = env_parse("FAST_VERIFY_SAMPLE_BYTES")? {
            self.fast_verify_sample_bytes = v;
        }
        if let Some(v) = env_parse("BATCH_SIZE")? {
            self.batch_size = v;
        }
        if let Some(v) = env_parse("WORKER_COUNT")? {
            self.worker_count = v;
        }
        if let Some(v) = env_parse("MAX_INFLIGHT_FACTOR")? {
            self.max_inflight_factor = v;
        }
        if let Some(v) = env_var("SNAPSHOT_PREFIX") {
            self.snapshot_prefix = v;
        }
        if let Some(v) = env_parse("MIN_PLANNING_SIZE")? {
            self.min_planning_size = v;
        }
        if let Some(v) = env_var("SEEDING_ROOTS") {
            self.seeding_roots = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Some(v) = env_var("MOVE_TARGET_TEMPLATE") {
            self.move_target_template = Some(v);
        }
        Ok(())
    }

    /// Maximum number of hashing tasks the scanner coordinator keeps
    /// in flight at once.
    pub fn max_inflight(&self) -> usize {
        self.worker_count * self.max_inflight_factor
    }
}

fn env_var(field: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{field}")).ok()
}

fn env_parse<T: std::str::FromStr>(field: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_var(field) {
        Some(v) => Ok(Some(v.parse()?)),
        None => Ok(None),
    }
}
