//! Database access for ccv-art
//!
//! One SQLite database holding the art cache. Schema is created on startup;
//! every optional media column is an explicit nullable column.

pub mod art_cache;

pub use art_cache::{ArtCacheStore, MediaPatch};

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the art cache table if it doesn't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS art_cache (
            decade TEXT NOT NULL,
            region TEXT NOT NULL,
            art_form TEXT NOT NULL,

            popular_genre TEXT NOT NULL,
            popular_artists TEXT NOT NULL,
            popular_name TEXT NOT NULL,
            popular_description TEXT NOT NULL,
            popular_image_url TEXT,
            popular_image_source_url TEXT,
            popular_media_kind TEXT,
            popular_media_title TEXT,
            popular_media_embed_url TEXT,
            popular_media_external_url TEXT,
            popular_blog_url TEXT,
            popular_sales TEXT,

            timeless_genre TEXT NOT NULL,
            timeless_artists TEXT NOT NULL,
            timeless_name TEXT NOT NULL,
            timeless_description TEXT NOT NULL,
            timeless_image_url TEXT,
            timeless_image_source_url TEXT,
            timeless_media_kind TEXT,
            timeless_media_title TEXT,
            timeless_media_embed_url TEXT,
            timeless_media_external_url TEXT,
            timeless_blog_url TEXT,
            timeless_sales TEXT,

            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,

            PRIMARY KEY (decade, region, art_form)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (art_cache)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_creates_database_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/dir/ccv-art.db");

        let pool = init_database_pool(&db_path).await.unwrap();
        assert!(db_path.exists());

        // Table exists and is queryable
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM art_cache")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
