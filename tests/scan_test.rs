//! Scanner integration tests covering spec.md §8 scenarios S1-S3.

mod support;

use hoard_catalog::scanner::{scan, CancellationFlag, HashMode, ScanOptions};
use pretty_assertions::assert_eq;
use std::os::unix::fs::MetadataExt;
use support::{open_memory_catalog, write_file, FakeOracle};
use tempfile::tempdir;

fn fast_options() -> ScanOptions {
    ScanOptions {
        parallel: true,
        workers: 2,
        batch_size: 100,
        hash_mode: HashMode::Fast,
        scan_nested_datasets: true,
        max_inflight: 16,
    }
}

fn full_options() -> ScanOptions {
    ScanOptions {
        hash_mode: HashMode::Full,
        ..fast_options()
    }
}

#[tokio::test]
async fn s1_first_scan_adds_every_file() {
    let root = tempdir().unwrap();
    write_file(root.path(), "a.txt", b"content1");
    write_file(root.path(), "b.txt", b"content2");
    write_file(root.path(), "subdir/c.txt", b"content3");

    let store = open_memory_catalog().await;
    let oracle = FakeOracle { fs_uuid: "fs-s1".to_string() };

    let summary = scan(&store, &oracle, root.path(), fast_options(), CancellationFlag::new(), None)
        .await
        .unwrap();

    assert_eq!(summary.added, 3);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.unchanged, 0);
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.scanned, 3);
}

#[tokio::test]
async fn s2_rescan_unchanged_tree_touches_nothing() {
    let root = tempdir().unwrap();
    write_file(root.path(), "a.txt", b"content1");
    write_file(root.path(), "b.txt", b"content2");
    write_file(root.path(), "subdir/c.txt", b"content3");

    let store = open_memory_catalog().await;
    let oracle = FakeOracle { fs_uuid: "fs-s2".to_string() };

    scan(&store, &oracle, root.path(), fast_options(), CancellationFlag::new(), None)
        .await
        .unwrap();

    let summary = scan(&store, &oracle, root.path(), fast_options(), CancellationFlag::new(), None)
        .await
        .unwrap();

    assert_eq!(summary.added, 0);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.unchanged, 3);
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.bytes_hashed, 0);
}

#[tokio::test]
async fn s3_hardlink_propagation_hashes_each_inode_once() {
    let root = tempdir().unwrap();
    let a = write_file(root.path(), "A", b"shared content payload");
    std::fs::hard_link(&a, root.path().join("A_link1")).unwrap();
    std::fs::hard_link(&a, root.path().join("A_link2")).unwrap();
    write_file(root.path(), "C", b"unique content");

    let store = open_memory_catalog().await;
    let oracle = FakeOracle { fs_uuid: "fs-s3".to_string() };

    let summary = scan(&store, &oracle, root.path(), full_options(), CancellationFlag::new(), None)
        .await
        .unwrap();

    let expected_bytes = "shared content payload".len() as i64 + "unique content".len() as i64;
    assert_eq!(summary.bytes_hashed, expected_bytes);

    let device_id = std::fs::metadata(root.path()).unwrap().dev() as i64;
    let rows = store.load_active_under_root(device_id, "").await.unwrap();
    let a_rows: Vec<_> = rows.iter().filter(|r| r.path.starts_with('A')).collect();
    assert_eq!(a_rows.len(), 3);
    let hashes: std::collections::HashSet<_> = a_rows.iter().map(|r| r.full_hash_primary.clone()).collect();
    assert_eq!(hashes.len(), 1, "all hardlinked rows must share one full hash");
    let calculated = a_rows.iter().filter(|r| r.hash_source == "calculated").count();
    assert_eq!(calculated, 1, "exactly one row per inode group is the calculated source");
}
