//! Tag cache operations
//!
//! Flat (sop_instance_uid, tag) -> value store populated opportunistically
//! during import from fields the parser already extracted. Tags use the
//! DICOM "GGGG,EEEE" string form. A miss never means the source record is
//! invalid, only that re-parsing is required. Writes are idempotent upserts
//! (last write wins), so concurrent writers are safe.

use dicat_common::Result;
use sqlx::SqlitePool;

/// Upsert one cached tag value.
pub async fn put(pool: &SqlitePool, sop_instance_uid: &str, tag: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tag_cache (sop_instance_uid, tag, value, updated_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(sop_instance_uid, tag) DO UPDATE SET
            value = excluded.value,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(sop_instance_uid)
    .bind(tag)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert a batch of tag values for one instance in a single transaction.
pub async fn put_many(
    pool: &SqlitePool,
    sop_instance_uid: &str,
    entries: &[(&str, String)],
) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for (tag, value) in entries {
        sqlx::query(
            r#"
            INSERT INTO tag_cache (sop_instance_uid, tag, value, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(sop_instance_uid, tag) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(sop_instance_uid)
        .bind(tag)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Look up a cached tag value. `None` on a miss; the caller falls back to
/// re-parsing the source file.
pub async fn get(pool: &SqlitePool, sop_instance_uid: &str, tag: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar(
        "SELECT value FROM tag_cache WHERE sop_instance_uid = ? AND tag = ?",
    )
    .bind(sop_instance_uid)
    .bind(tag)
    .fetch_optional(pool)
    .await?;

    Ok(value)
}

/// Remove all cached entries for an instance. Used when an instance record
/// is replaced; plain import never calls this.
pub async fn invalidate(pool: &SqlitePool, sop_instance_uid: &str) -> Result<()> {
    sqlx::query("DELETE FROM tag_cache WHERE sop_instance_uid = ?")
        .bind(sop_instance_uid)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        dicat_common::db::init::create_tag_cache_tables(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let pool = test_pool().await;

        put(&pool, "1.2.3", "0008,0060", "CT").await.unwrap();
        assert_eq!(
            get(&pool, "1.2.3", "0008,0060").await.unwrap().as_deref(),
            Some("CT")
        );
        assert_eq!(get(&pool, "1.2.3", "0010,0010").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let pool = test_pool().await;

        put(&pool, "1.2.3", "0008,0060", "CT").await.unwrap();
        put(&pool, "1.2.3", "0008,0060", "MR").await.unwrap();

        assert_eq!(
            get(&pool, "1.2.3", "0008,0060").await.unwrap().as_deref(),
            Some("MR")
        );
    }

    #[tokio::test]
    async fn test_invalidate_removes_all_entries_for_instance() {
        let pool = test_pool().await;

        put_many(
            &pool,
            "1.2.3",
            &[
                ("0008,0060", "CT".to_string()),
                ("0010,0010", "Doe^Jane".to_string()),
            ],
        )
        .await
        .unwrap();
        put(&pool, "1.2.4", "0008,0060", "MR").await.unwrap();

        invalidate(&pool, "1.2.3").await.unwrap();

        assert_eq!(get(&pool, "1.2.3", "0008,0060").await.unwrap(), None);
        assert_eq!(get(&pool, "1.2.3", "0010,0010").await.unwrap(), None);
        // Other instances untouched
        assert_eq!(
            get(&pool, "1.2.4", "0008,0060").await.unwrap().as_deref(),
            Some("MR")
        );
    }
}
