//! Bounded in-flight worker pool (spec.md §4.3 "Concurrency", §5).
//!
//! A single coordinator drains a bounded set of pure hashing tasks and
//! batches their results into catalog commits; workers never touch the
//! catalog. Cancellation sets an abort flag that stops admitting new
//! work and finalizes with whatever has already completed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::ScanError;
use crate::scanner::hash;
use crate::scanner::walk::InodeGroup;

/// Shared cancellation flag. Cloned into the coordinator and handed to
/// callers who want to request an interrupt.
#[derive(Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The hash work a group needs (spec.md §4.3 step 5's `hash_mode`
/// interaction), decided by the caller before dispatch.
pub enum HashWork {
    /// Only the quick prefix hash is required.
    Quick,
    /// Both full-content digests are required.
    Full,
}

/// Outcome of hashing one inode group's representative.
pub struct HashedGroup {
    pub group: InodeGroup,
    pub quick_hash: Option<String>,
    pub full_hash_primary: Option<String>,
    pub full_hash_secondary: Option<String>,
    pub bytes_hashed: u64,
    pub error: Option<ScanError>,
}

/// Runs `work` items (inode groups paired with the hash work they need)
/// through a bounded-concurrency pool, invoking `on_result` for each
/// completed group as it lands. Stops admitting new work once `cancel`
/// is set; already in-flight tasks are drained before returning.
pub async fn run<F>(
    work: Vec<(InodeGroup, HashWork)>,
    max_inflight: usize,
    cancel: CancellationFlag,
    mut on_result: F,
) -> usize
where
    F: FnMut(HashedGroup),
{
    let semaphore = Arc::new(Semaphore::new(max_inflight.max(1)));
    let mut tasks = JoinSet::new();
    let mut admitted = 0usize;
    let mut work = work.into_iter();

    loop {
        while tasks.len() < max_inflight {
            if cancel.is_cancelled() {
                break;
            }
            let Some((group, hash_work)) = work.next() else {
                break;
            };
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore open");
            admitted += 1;
            tasks.spawn(async move {
                let _permit = permit;
                hash_one(group, hash_work).await
            });
        }

        if tasks.is_empty() {
            break;
        }

        match tasks.join_next().await {
            Some(Ok(result)) => on_result(result),
            Some(Err(join_err)) => {
                warn!(error = %join_err, "hashing task panicked");
            }
            None => break,
        }
    }

    if cancel.is_cancelled() {
        info!(admitted, "scan coordinator stopped admitting new work after cancellation");
    }

    admitted
}

async fn hash_one(group: InodeGroup, work: HashWork) -> HashedGroup {
    let path = group.representative.abs_path.clone();
    match work {
        HashWork::Quick => match hash::quick_hash(&path).await {
            Ok(digest) => HashedGroup {
                group,
                quick_hash: Some(digest),
                full_hash_primary: None,
                full_hash_secondary: None,
                bytes_hashed: 0,
                error: None,
            },
            Err(err) => HashedGroup {
                group,
                quick_hash: None,
                full_hash_primary: None,
                full_hash_secondary: None,
                bytes_hashed: 0,
                error: Some(err),
            },
        },
        HashWork::Full => {
            let quick = hash::quick_hash(&path).await;
            match hash::full_hash(&path).await {
                Ok(full) => HashedGroup {
                    group,
                    quick_hash: quick.ok(),
                    full_hash_primary: Some(full.full_hash_primary),
                    full_hash_secondary: Some(full.full_hash_secondary),
                    bytes_hashed: full.bytes_read,
                    error: None,
                },
                Err(err) => HashedGroup {
                    group,
                    quick_hash: quick.ok(),
                    full_hash_primary: None,
                    full_hash_secondary: None,
                    bytes_hashed: 0,
                    error: Some(err),
                },
            }
        }
    }
}
