//! Schema versioning for the sales store
//!
//! Migrations are numbered SQL scripts applied in order, each inside its
//! own transaction together with the row that records it. The first one
//! also seeds "Batch 1", so a fresh store always has a current batch.

use crate::error::Result;
use sqlx::sqlite::SqlitePool;

/// Numbered migration scripts, oldest first
const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("migrations/001_initial_schema.sql"))];

/// Bring the store up to the latest schema version
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    // Per-connection settings; `create_pool` also sets them on every connection
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?;
    tracing::debug!("Schema version {}", current);

    for &(version, script) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
        apply_migration(pool, version, script).await?;
    }

    Ok(())
}

async fn apply_migration(pool: &SqlitePool, version: i32, script: &str) -> Result<()> {
    tracing::info!("Applying schema migration {}", version);

    let mut tx = pool.begin().await?;
    for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    sqlx::query("INSERT INTO migrations (version) VALUES (?)")
        .bind(version)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("Schema migration {} applied", version);
    Ok(())
}
