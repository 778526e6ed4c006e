//! The Catalog Store: a SQLite-backed database of everything the scanner
//! and dedup engine know about a set of devices.

pub mod device_registry;
pub mod entities;
pub mod files_table;
pub mod invariants;
pub mod migration;
pub mod store;

use std::path::Path;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection, DbErr, Statement};
use sea_orm::ConnectionTrait;
use sea_orm_migration::MigratorTrait;
use tracing::info;

/// Owns the connection pool to the catalog database and applies its
/// migrations on open.
pub struct Catalog {
    conn: DatabaseConnection,
}

impl Catalog {
    /// Open the catalog at `path`, creating and migrating it if absent.
    pub async fn open(path: &Path) -> Result<Self, DbErr> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DbErr::Custom(format!("failed to create catalog directory: {e}")))?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", path.display());

        let mut opt = ConnectOptions::new(db_url);
        opt.max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .idle_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt).await?;
        apply_pragmas(&conn).await;

        migration::Migrator::up(&conn, None).await?;
        info!(path = %path.display(), "catalog opened");

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

async fn apply_pragmas(conn: &DatabaseConnection) {
    for pragma in [
        "PRAGMA journal_mode=WAL",
        "PRAGMA synchronous=NORMAL",
        "PRAGMA temp_store=MEMORY",
        "PRAGMA foreign_keys=ON",
    ] {
        let _ = conn
            .execute(Statement::from_string(sea_orm::DatabaseBackend::Sqlite, pragma))
            .await;
    }
}
