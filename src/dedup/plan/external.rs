//! Optional external strategies the executor can delegate to: a
//! byte-for-byte group linker and snapshot creation (spec.md §4.7, §9
//! design note: "model as optional strategies behind a narrow
//! interface; internal implementations are the default").

use std::path::PathBuf;

/// Outcome of handing a set of paths to an external linker for one
/// content hash.
#[derive(Debug, Clone)]
pub struct LinkGroupResult {
    pub path: PathBuf,
    pub now_shares_inode_with_canonical: bool,
}

#[async_trait::async_trait]
pub trait ExternalLinker: Send + Sync {
    /// Links every path in `paths` to `canonical` by whatever means the
    /// tool uses; `expected_hash` is advisory context for its logs.
    async fn link_group(
        &self,
        canonical: &PathBuf,
        paths: &[PathBuf],
        expected_hash: &str,
    ) -> Result<Vec<LinkGroupResult>, String>;
}

#[async_trait::async_trait]
pub trait SnapshotCapability: Send + Sync {
    /// Creates `<dataset>@<label>`, returning the resulting snapshot id.
    async fn snapshot(&self, dataset: &str, label: &str) -> Result<String, String>;
}
