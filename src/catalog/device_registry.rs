//! Device registration protocol (spec.md §4.2).

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::json;
use tracing::warn;

use crate::catalog::entities::device;
use crate::catalog::files_table::{self, FilesTableRegistry};
use crate::error::{CatalogError, CatalogResult};
use crate::identity::FsIdentity;

/// Registers or updates a device for the given identity, per spec.md's
/// three-way protocol: new device, same `device_id`, or changed
/// `device_id` (triggers a files-table rename).
pub async fn register_or_update_device(
    conn: &DatabaseConnection,
    tables: &FilesTableRegistry,
    identity: &FsIdentity,
) -> CatalogResult<device::Model> {
    let existing = device::Entity::find()
        .filter(device::Column::FsUuid.eq(identity.fs_uuid.clone()))
        .one(conn)
        .await?;

    let now = Utc::now();

    let model = match existing {
        None => {
            let alias = suggest_alias(conn, &identity.mount_point.to_string_lossy()).await?;
            let zfs = identity.zfs.as_ref();
            let active = device::ActiveModel {
                fs_uuid: Set(identity.fs_uuid.clone()),
                device_id: Set(identity.device_id),
                alias: Set(alias),
                mount_point: Set(identity.mount_point.to_string_lossy().into_owned()),
                preferred_mount_point: Set(identity.mount_point.to_string_lossy().into_owned()),
                fs_type: Set(identity.fs_type.clone()),
                zfs_pool_name: Set(zfs.map(|z| z.pool.clone())),
                zfs_dataset_name: Set(zfs.map(|z| z.dataset.clone())),
                zfs_pool_guid: Set(zfs.map(|z| z.pool_guid.clone())),
                first_scanned_at: Set(now.into()),
                last_scanned_at: Set(now.into()),
                scan_count: Set(1),
                total_files: Set(0),
                total_bytes: Set(0),
                device_id_history: Set(json!([])),
                ..Default::default()
            };
            active.insert(conn).await?
        }
        Some(row) if row.device_id == identity.device_id => {
            let mut active: device::ActiveModel = row.into();
            active.scan_count = Set(active.scan_count.unwrap() + 1);
            active.last_scanned_at = Set(now.into());
            active.mount_point = Set(identity.mount_point.to_string_lossy().into_owned());
            active.update(conn).await?
        }
        Some(row) => {
            let old_device_id = row.device_id;
            let mut history: Vec<serde_json::Value> = row
                .device_id_history
                .as_array()
                .cloned()
                .unwrap_or_default();
            history.push(json!({ "device_id": old_device_id, "changed_at": now }));

            let renamed = files_table::rename_table(conn, old_device_id, identity.device_id).await?;
            if !renamed {
                warn!(
                    fs_uuid = %identity.fs_uuid,
                    old_device_id,
                    new_device_id = identity.device_id,
                    "files table rename target already exists; leaving both tables in place"
                );
            } else {
                tables.invalidate(old_device_id, identity.device_id).await;
            }

            let mut active: device::ActiveModel = row.into();
            active.device_id = Set(identity.device_id);
            active.device_id_history = Set(serde_json::Value::Array(history));
            active.scan_count = Set(active.scan_count.unwrap() + 1);
            active.last_scanned_at = Set(now.into());
            active.mount_point = Set(identity.mount_point.to_string_lossy().into_owned());
            active.update(conn).await?
        }
    };

    tables.ensure(conn, model.device_id).await?;
    Ok(model)
}

const COMMON_ALIAS_NAMES: [&str; 5] = ["pool", "stash", "backup", "archive", "data"];

/// Auto-suggests an alias from `mount_point`, disambiguated with a
/// numeric suffix against existing aliases. Searches path components in
/// reverse for a common storage name (`pool`, `stash`, `backup`,
/// `archive`, `data`); falls back to the last component if none match.
async fn suggest_alias(conn: &DatabaseConnection, mount_point: &str) -> CatalogResult<String> {
    let parts: Vec<&str> = mount_point
        .trim_end_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let base = parts
        .iter()
        .rev()
        .map(|p| p.to_lowercase())
        .find(|p| COMMON_ALIAS_NAMES.contains(&p.as_str()))
        .or_else(|| parts.last().map(|p| p.to_lowercase()))
        .unwrap_or_else(|| "device".to_string())
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>();
    let base = if base.is_empty() { "device".to_string() } else { base };

    if device::Entity::find()
        .filter(device::Column::Alias.eq(base.clone()))
        .one(conn)
        .await?
        .is_none()
    {
        return Ok(base);
    }

    for suffix in 2..1000 {
        let candidate = format!("{base}{suffix}");
        if device::Entity::find()
            .filter(device::Column::Alias.eq(candidate.clone()))
            .one(conn)
            .await?
            .is_none()
        {
            return Ok(candidate);
        }
    }

    Err(CatalogError::AliasExhausted(base))
}
