//! Database migrations.
//!
//! Per-device `files_<device_id>` tables are not migrations: they are
//! created on demand by [`crate::catalog::files_table`] the first time a
//! device is registered.

use sea_orm_migration::prelude::*;

mod m20240101_000001_create_devices;
mod m20240101_000002_create_scan_sessions;
mod m20240101_000003_create_scan_roots;
mod m20240102_000001_create_link_plans;
mod m20240102_000002_create_link_actions;
mod m20240103_000001_create_payloads;
mod m20240103_000002_create_torrent_instances;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_devices::Migration),
            Box::new(m20240101_000002_create_scan_sessions::Migration),
            Box::new(m20240101_000003_create_scan_roots::Migration),
            Box::new(m20240102_000001_create_link_plans::Migration),
            Box::new(m20240102_000002_create_link_actions::Migration),
            Box::new(m20240103_000001_create_payloads::Migration),
            Box::new(m20240103_000002_create_torrent_instances::Migration),
        ]
    }
}
