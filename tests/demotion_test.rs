//! Payload Engine integration test covering spec.md §8 scenario S7.

mod support;

use chrono::Utc;
use hoard_catalog::catalog::entities::{device, payload, torrent_instance};
use hoard_catalog::catalog::files_table::{self, FileRecord};
use hoard_catalog::payload::demotion::{plan_demotion, Decision};
use pretty_assertions::assert_eq;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use support::open_memory_catalog;

fn file_row(path: &str, inode: i64, hash: &str) -> FileRecord {
    let now = Utc::now();
    FileRecord {
        path: path.to_string(),
        size: 10,
        mtime: 0.0,
        quick_hash: Some(hash.to_string()),
        full_hash_primary: Some(hash.to_string()),
        full_hash_secondary: Some(hash.to_string()),
        hash_source: "calculated".to_string(),
        inode,
        first_seen_at: now,
        last_seen_at: now,
        last_modified_at: now,
        status: "active".to_string(),
        discovered_under: "".to_string(),
    }
}

#[tokio::test]
async fn s7_external_consumer_outside_seeding_roots_blocks() {
    let store = open_memory_catalog().await;
    let now = Utc::now();

    device::ActiveModel {
        fs_uuid: Set("fs-demotion".to_string()),
        device_id: Set(42),
        alias: Set("source".to_string()),
        mount_point: Set("/mnt/source".to_string()),
        preferred_mount_point: Set("/mnt/source".to_string()),
        fs_type: Set("ext4".to_string()),
        zfs_pool_name: Set(None),
        zfs_dataset_name: Set(None),
        zfs_pool_guid: Set(None),
        first_scanned_at: Set(now.into()),
        last_scanned_at: Set(now.into()),
        scan_count: Set(1),
        total_files: Set(2),
        total_bytes: Set(20),
        device_id_history: Set(json!([])),
        ..Default::default()
    }
    .insert(store.conn())
    .await
    .unwrap();

    store.tables().ensure(store.conn(), 42).await.unwrap();
    files_table::upsert_batch(
        store.conn(),
        42,
        &[
            file_row("library/show/episode.mkv", 900, "contenthash"),
            file_row("outside-tree/leaked-copy.mkv", 900, "contenthash"),
        ],
    )
    .await
    .unwrap();

    let payload_row = payload::ActiveModel {
        payload_hash: Set(Some("payloadhash".to_string())),
        device_id: Set(42),
        root_path: Set("library/show".to_string()),
        file_count: Set(1),
        total_bytes: Set(10),
        status: Set("complete".to_string()),
        last_built_at: Set(now.into()),
        ..Default::default()
    }
    .insert(store.conn())
    .await
    .unwrap();

    torrent_instance::ActiveModel {
        torrent_hash: Set("abc123".to_string()),
        payload_id: Set(payload_row.payload_id),
        device_id: Set(42),
        save_path: Set("/mnt/source/library".to_string()),
        root_name: Set("show".to_string()),
        category: Set(None),
        tags: Set(None),
        last_seen_at: Set(now.into()),
    }
    .insert(store.conn())
    .await
    .unwrap();

    let plan = plan_demotion(
        &store,
        "abc123",
        42,
        43,
        &["library".to_string()],
        None,
    )
    .await
    .unwrap();

    assert_eq!(plan.decision, Decision::Block);
    assert!(
        plan.reasons.iter().any(|r| r.contains("outside-tree/leaked-copy.mkv")),
        "block reason must name the offending external path, got: {:?}",
        plan.reasons
    );
}
