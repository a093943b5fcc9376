//! Database initialization
//!
//! Opens (creating if needed) the two SQLite stores and applies the schema.
//! All schema statements are `CREATE ... IF NOT EXISTS`, so initialization
//! is idempotent and safe to run on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// File name of the hierarchy catalog database.
pub const CATALOG_DB_FILENAME: &str = "dicat.sqlite";

/// File name of the tag cache database.
pub const TAG_CACHE_DB_FILENAME: &str = "dicat-tagcache.sqlite";

/// Open or create the hierarchy catalog database.
pub async fn open_catalog(db_path: &Path) -> Result<SqlitePool> {
    let pool = open_pool(db_path).await?;
    create_catalog_tables(&pool).await?;
    Ok(pool)
}

/// Open or create the tag cache database.
pub async fn open_tag_cache(db_path: &Path) -> Result<SqlitePool> {
    let pool = open_pool(db_path).await?;
    create_tag_cache_tables(&pool).await?;
    Ok(pool)
}

/// Open both stores under the given directory, creating it if needed.
pub async fn open_stores(dir: &Path) -> Result<(SqlitePool, SqlitePool)> {
    std::fs::create_dir_all(dir)?;
    let catalog = open_catalog(&dir.join(CATALOG_DB_FILENAME)).await?;
    let tag_cache = open_tag_cache(&dir.join(TAG_CACHE_DB_FILENAME)).await?;
    Ok((catalog, tag_cache))
}

async fn open_pool(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connect options are applied per connection, so every connection the
    // pool hands out enforces the parent-key foreign keys. WAL allows
    // concurrent readers while the import writer holds the db.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    Ok(pool)
}

/// Create the four hierarchy tables and their parent-key indexes.
///
/// Business identifiers (patient ID and the three instance UIDs) are the
/// primary keys; uniqueness is enforced by the schema, not by the importer.
pub async fn create_catalog_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS patients (
            patient_id TEXT PRIMARY KEY,
            patient_name TEXT,
            birth_date TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS studies (
            study_instance_uid TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL REFERENCES patients(patient_id),
            study_date TEXT,
            description TEXT,
            accession_number TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS series (
            series_instance_uid TEXT PRIMARY KEY,
            study_instance_uid TEXT NOT NULL REFERENCES studies(study_instance_uid),
            modality TEXT,
            series_number INTEGER,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS instances (
            sop_instance_uid TEXT PRIMARY KEY,
            series_instance_uid TEXT NOT NULL REFERENCES series(series_instance_uid),
            file_path TEXT NOT NULL,
            storage_mode TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            sop_class_uid TEXT,
            instance_number INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_studies_patient ON studies(patient_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_series_study ON series(study_instance_uid)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_instances_series ON instances(series_instance_uid)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the flat (sop_instance_uid, tag) -> value cache table.
pub async fn create_tag_cache_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tag_cache (
            sop_instance_uid TEXT NOT NULL,
            tag TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (sop_instance_uid, tag)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
