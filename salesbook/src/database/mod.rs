//! Database module
//!
//! The catalog and sales store:
//! - Schema and migrations
//! - Model definitions
//! - Repository layer for catalog, sales, batch and export record queries

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::{Repository, ResetSummary};
pub use schema::initialize_database;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Build connection options shared by migration and application connections.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
        },
    )
}

/// Open the store at `db_path`, creating and migrating it if needed.
///
/// The schema is brought up to date on its own single connection, which
/// is closed before the shared pool opens, so no pooled connection can hold
/// a schema older than the one the repository queries.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Opening sales store at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let schema_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;
    initialize_database(&schema_pool).await?;
    schema_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::info!("Sales store ready");

    Ok(pool)
}
