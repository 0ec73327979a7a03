//! Database initialization
//!
//! Creates the SQLite database on first use and brings up the five-table
//! inspection schema. The pool is constructed here and passed explicitly to
//! everything that needs it; there is no process-wide connection state.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys (composition integrity relies on them)
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows analytics readers to run concurrently with ingestion
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// Create the inspection entity tables (idempotent, safe to call repeatedly)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_product_inspections_table(pool).await?;
    create_machine_states_table(pool).await?;
    create_object_detections_table(pool).await?;
    create_defects_table(pool).await?;
    create_pixel_severities_table(pool).await?;
    Ok(())
}

async fn create_product_inspections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_inspections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version TEXT NOT NULL,
            timestamp TIMESTAMP NOT NULL,
            molding_machine_id TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_inspections_machine
         ON product_inspections(molding_machine_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_inspections_timestamp
         ON product_inspections(timestamp)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_machine_states_table(pool: &SqlitePool) -> Result<()> {
    // One state row per inspection; telemetry fields are best-effort and
    // may all be NULL. Unrecognized machine-reported fields land in the
    // `extra` JSON column.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS machine_states (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            inspection_id INTEGER NOT NULL UNIQUE
                REFERENCES product_inspections(id) ON DELETE CASCADE,
            cycle_time REAL,
            inj_peak_pressure REAL,
            barrel1 REAL,
            barrel2 REAL,
            barrel3 REAL,
            barrel4 REAL,
            barrel5 REAL,
            barrel6 REAL,
            extra TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_object_detections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS object_detections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            inspection_id INTEGER NOT NULL
                REFERENCES product_inspections(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            reject BOOLEAN NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_detections_inspection
         ON object_detections(inspection_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_defects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS defects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_detection_id INTEGER NOT NULL
                REFERENCES object_detections(id) ON DELETE CASCADE,
            defect_type TEXT NOT NULL,
            reject BOOLEAN NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_defects_detection
         ON defects(object_detection_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_defects_type ON defects(defect_type)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_pixel_severities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pixel_severities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            defect_id INTEGER NOT NULL UNIQUE
                REFERENCES defects(id) ON DELETE CASCADE,
            reject BOOLEAN NOT NULL,
            value REAL NOT NULL,
            min_value REAL,
            max_value REAL,
            threshold REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_tables_is_idempotent() {
        let pool = memory_pool().await;
        create_tables(&pool).await.unwrap();
        create_tables(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name IN ('product_inspections', 'machine_states',
                          'object_detections', 'defects', 'pixel_severities')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn init_database_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("moldtrack.db");

        let pool = init_database(&path).await.unwrap();
        assert!(path.exists());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_inspections")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
