//! Plan Executor integration tests covering spec.md §8 scenario S5.

mod support;

use chrono::Utc;
use hoard_catalog::catalog::entities::{link_action, link_plan};
use hoard_catalog::dedup::plan::executor::{execute_plan, ExecuteOptions};
use hoard_catalog::dedup::plan::verify::VerifyMode;
use pretty_assertions::assert_eq;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;
use support::open_memory_catalog;

async fn seed_plan(store: &hoard_catalog::catalog::store::CatalogStore, sizes: &[i64]) -> i32 {
    let now = Utc::now();
    let plan = link_plan::ActiveModel {
        name: Set("test-plan".to_string()),
        status: Set("pending".to_string()),
        device_id: Set(1),
        device_alias: Set("test-device".to_string()),
        mount_point: Set("/tmp/does-not-matter".to_string()),
        total_opportunities: Set(sizes.len() as i64),
        total_bytes_saveable: Set(sizes.iter().sum()),
        total_bytes_saved: Set(0),
        actions_total: Set(sizes.len() as i64),
        actions_executed: Set(0),
        actions_failed: Set(0),
        actions_skipped: Set(0),
        metadata: Set(json!({})),
        notes: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(store.conn())
    .await
    .unwrap();

    for (i, size) in sizes.iter().enumerate() {
        link_action::ActiveModel {
            plan_id: Set(plan.id),
            action_type: Set("HARDLINK".to_string()),
            status: Set("pending".to_string()),
            canonical_path: Set(format!("canonical-{i}")),
            duplicate_path: Set(format!("duplicate-{i}")),
            canonical_inode: Set(100 + i as i64),
            duplicate_inode: Set(200 + i as i64),
            device_id: Set(1),
            file_size: Set(*size),
            sha256: Set(format!("hash-{i}")),
            bytes_to_save: Set(*size),
            bytes_saved: Set(0),
            executed_at: Set(None),
            error_message: Set(None),
            ..Default::default()
        }
        .insert(store.conn())
        .await
        .unwrap();
    }

    plan.id
}

#[tokio::test]
async fn s5_dry_run_reports_without_touching_filesystem_or_rows() {
    let store = open_memory_catalog().await;
    let plan_id = seed_plan(&store, &[1000, 2000, 3000]).await;

    let summary = execute_plan(
        &store,
        plan_id,
        None,
        "test",
        None,
        ExecuteOptions {
            dry_run: true,
            verify_mode: VerifyMode::None,
            create_backup: false,
            limit: None,
            snapshot: false,
            fixup_permissions: false,
        },
        None,
    )
    .await
    .unwrap();

    assert_eq!(summary.executed, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.bytes_saved, 6000);

    let actions = link_action::Entity::find()
        .filter(link_action::Column::PlanId.eq(plan_id))
        .all(store.conn())
        .await
        .unwrap();
    assert!(
        actions.iter().all(|a| a.status == "pending"),
        "dry-run must not mutate action rows"
    );
}
