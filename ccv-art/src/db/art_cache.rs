//! Art cache store (cache-aside)
//!
//! Keyed by (decade, region, art_form). Every operation is independently
//! fault-tolerant: storage failures degrade `get` to a miss and writes to a
//! logged no-op, so an unreachable database never fails a request.

use sqlx::SqlitePool;
use tracing::warn;

use crate::models::{ArtData, ArtEntry, ArtImage, ArtKey, MediaKind, MediaRef};

/// Field-level media patch. `None` fields are left untouched; a present field
/// is only applied when the stored value is still absent (a patch never
/// downgrades or replaces an already-enriched field).
#[derive(Debug, Clone, Default)]
pub struct MediaPatch {
    pub popular_image: Option<ArtImage>,
    pub popular_media: Option<MediaRef>,
    pub popular_blog_url: Option<String>,
    pub popular_sales: Option<String>,
    pub timeless_image: Option<ArtImage>,
    pub timeless_media: Option<MediaRef>,
    pub timeless_blog_url: Option<String>,
    pub timeless_sales: Option<String>,
}

impl MediaPatch {
    pub fn is_empty(&self) -> bool {
        self.popular_image.is_none()
            && self.popular_media.is_none()
            && self.popular_blog_url.is_none()
            && self.popular_sales.is_none()
            && self.timeless_image.is_none()
            && self.timeless_media.is_none()
            && self.timeless_blog_url.is_none()
            && self.timeless_sales.is_none()
    }
}

/// Database row shape for one cached key
#[derive(sqlx::FromRow)]
struct ArtCacheRow {
    decade: String,
    region: String,
    art_form: String,
    popular_genre: String,
    popular_artists: String,
    popular_name: String,
    popular_description: String,
    popular_image_url: Option<String>,
    popular_image_source_url: Option<String>,
    popular_media_kind: Option<String>,
    popular_media_title: Option<String>,
    popular_media_embed_url: Option<String>,
    popular_media_external_url: Option<String>,
    popular_blog_url: Option<String>,
    popular_sales: Option<String>,
    timeless_genre: String,
    timeless_artists: String,
    timeless_name: String,
    timeless_description: String,
    timeless_image_url: Option<String>,
    timeless_image_source_url: Option<String>,
    timeless_media_kind: Option<String>,
    timeless_media_title: Option<String>,
    timeless_media_embed_url: Option<String>,
    timeless_media_external_url: Option<String>,
    timeless_blog_url: Option<String>,
    timeless_sales: Option<String>,
}

const SELECT_COLUMNS: &str = "decade, region, art_form, \
     popular_genre, popular_artists, popular_name, popular_description, \
     popular_image_url, popular_image_source_url, \
     popular_media_kind, popular_media_title, popular_media_embed_url, popular_media_external_url, \
     popular_blog_url, popular_sales, \
     timeless_genre, timeless_artists, timeless_name, timeless_description, \
     timeless_image_url, timeless_image_source_url, \
     timeless_media_kind, timeless_media_title, timeless_media_embed_url, timeless_media_external_url, \
     timeless_blog_url, timeless_sales";

fn hydrate_image(url: Option<String>, source_url: Option<String>) -> Option<ArtImage> {
    url.map(|url| ArtImage {
        url,
        source_url: source_url.unwrap_or_default(),
    })
}

fn hydrate_media(
    kind: Option<String>,
    title: Option<String>,
    embed_url: Option<String>,
    external_url: Option<String>,
) -> Option<MediaRef> {
    let kind = kind.as_deref().and_then(MediaKind::parse)?;
    Some(MediaRef {
        kind,
        title: title.unwrap_or_default(),
        embed_url: embed_url.unwrap_or_default(),
        external_url: external_url.unwrap_or_default(),
    })
}

impl From<ArtCacheRow> for ArtData {
    fn from(row: ArtCacheRow) -> Self {
        ArtData {
            decade: row.decade,
            region: row.region,
            art_form: row.art_form,
            popular: ArtEntry {
                genre: row.popular_genre,
                artists: row.popular_artists,
                name: row.popular_name,
                description: row.popular_description,
                image: hydrate_image(row.popular_image_url, row.popular_image_source_url),
                media: hydrate_media(
                    row.popular_media_kind,
                    row.popular_media_title,
                    row.popular_media_embed_url,
                    row.popular_media_external_url,
                ),
                blog_url: row.popular_blog_url,
                sales: row.popular_sales,
            },
            timeless: ArtEntry {
                genre: row.timeless_genre,
                artists: row.timeless_artists,
                name: row.timeless_name,
                description: row.timeless_description,
                image: hydrate_image(row.timeless_image_url, row.timeless_image_source_url),
                media: hydrate_media(
                    row.timeless_media_kind,
                    row.timeless_media_title,
                    row.timeless_media_embed_url,
                    row.timeless_media_external_url,
                ),
                blog_url: row.timeless_blog_url,
                sales: row.timeless_sales,
            },
        }
    }
}

/// Cache-aside store over SQLite
#[derive(Clone)]
pub struct ArtCacheStore {
    pool: SqlitePool,
}

impl ArtCacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Retrieve cached data for a key. Returns None on miss or on any
    /// storage failure.
    pub async fn get(&self, key: &ArtKey) -> Option<ArtData> {
        let sql = format!(
            "SELECT {} FROM art_cache WHERE decade = ? AND region = ? AND art_form = ?",
            SELECT_COLUMNS
        );
        let result = sqlx::query_as::<_, ArtCacheRow>(&sql)
            .bind(&key.decade)
            .bind(&key.region)
            .bind(&key.art_form)
            .fetch_optional(&self.pool)
            .await;

        match result {
            Ok(row) => row.map(ArtData::from),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache get failed (database unavailable?)");
                None
            }
        }
    }

    /// Insert or overwrite the row for a key. Row-level last-write-wins;
    /// `created_at` is preserved on update. Returns false on storage failure.
    pub async fn upsert(&self, data: &ArtData) -> bool {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO art_cache (
                decade, region, art_form,
                popular_genre, popular_artists, popular_name, popular_description,
                popular_image_url, popular_image_source_url,
                popular_media_kind, popular_media_title, popular_media_embed_url, popular_media_external_url,
                popular_blog_url, popular_sales,
                timeless_genre, timeless_artists, timeless_name, timeless_description,
                timeless_image_url, timeless_image_source_url,
                timeless_media_kind, timeless_media_title, timeless_media_embed_url, timeless_media_external_url,
                timeless_blog_url, timeless_sales,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(decade, region, art_form) DO UPDATE SET
                popular_genre = excluded.popular_genre,
                popular_artists = excluded.popular_artists,
                popular_name = excluded.popular_name,
                popular_description = excluded.popular_description,
                popular_image_url = excluded.popular_image_url,
                popular_image_source_url = excluded.popular_image_source_url,
                popular_media_kind = excluded.popular_media_kind,
                popular_media_title = excluded.popular_media_title,
                popular_media_embed_url = excluded.popular_media_embed_url,
                popular_media_external_url = excluded.popular_media_external_url,
                popular_blog_url = excluded.popular_blog_url,
                popular_sales = excluded.popular_sales,
                timeless_genre = excluded.timeless_genre,
                timeless_artists = excluded.timeless_artists,
                timeless_name = excluded.timeless_name,
                timeless_description = excluded.timeless_description,
                timeless_image_url = excluded.timeless_image_url,
                timeless_image_source_url = excluded.timeless_image_source_url,
                timeless_media_kind = excluded.timeless_media_kind,
                timeless_media_title = excluded.timeless_media_title,
                timeless_media_embed_url = excluded.timeless_media_embed_url,
                timeless_media_external_url = excluded.timeless_media_external_url,
                timeless_blog_url = excluded.timeless_blog_url,
                timeless_sales = excluded.timeless_sales,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&data.decade)
        .bind(&data.region)
        .bind(&data.art_form)
        .bind(&data.popular.genre)
        .bind(&data.popular.artists)
        .bind(&data.popular.name)
        .bind(&data.popular.description)
        .bind(data.popular.image.as_ref().map(|i| i.url.clone()))
        .bind(data.popular.image.as_ref().map(|i| i.source_url.clone()))
        .bind(data.popular.media.as_ref().map(|m| m.kind.as_str()))
        .bind(data.popular.media.as_ref().map(|m| m.title.clone()))
        .bind(data.popular.media.as_ref().map(|m| m.embed_url.clone()))
        .bind(data.popular.media.as_ref().map(|m| m.external_url.clone()))
        .bind(&data.popular.blog_url)
        .bind(&data.popular.sales)
        .bind(&data.timeless.genre)
        .bind(&data.timeless.artists)
        .bind(&data.timeless.name)
        .bind(&data.timeless.description)
        .bind(data.timeless.image.as_ref().map(|i| i.url.clone()))
        .bind(data.timeless.image.as_ref().map(|i| i.source_url.clone()))
        .bind(data.timeless.media.as_ref().map(|m| m.kind.as_str()))
        .bind(data.timeless.media.as_ref().map(|m| m.title.clone()))
        .bind(data.timeless.media.as_ref().map(|m| m.embed_url.clone()))
        .bind(data.timeless.media.as_ref().map(|m| m.external_url.clone()))
        .bind(&data.timeless.blog_url)
        .bind(&data.timeless.sales)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(key = %data.key(), error = %e, "Cache upsert failed (database unavailable?)");
                false
            }
        }
    }

    /// Apply a field-level media patch under the merge rule: a stored field
    /// is only written when it is still absent and the incoming value is
    /// present. Compound fields (image, media) are gated on their sentinel
    /// column so a patch can't mix halves of two lookups.
    ///
    /// Returns true if the row exists and the patch was applied.
    pub async fn patch_media(&self, key: &ArtKey, patch: &MediaPatch) -> bool {
        if patch.is_empty() {
            return false;
        }

        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE art_cache SET
                popular_image_source_url = CASE WHEN popular_image_url IS NULL
                    THEN ? ELSE popular_image_source_url END,
                popular_image_url = COALESCE(popular_image_url, ?),
                popular_media_title = CASE WHEN popular_media_kind IS NULL
                    THEN ? ELSE popular_media_title END,
                popular_media_embed_url = CASE WHEN popular_media_kind IS NULL
                    THEN ? ELSE popular_media_embed_url END,
                popular_media_external_url = CASE WHEN popular_media_kind IS NULL
                    THEN ? ELSE popular_media_external_url END,
                popular_media_kind = COALESCE(popular_media_kind, ?),
                popular_blog_url = COALESCE(popular_blog_url, ?),
                popular_sales = COALESCE(popular_sales, ?),
                timeless_image_source_url = CASE WHEN timeless_image_url IS NULL
                    THEN ? ELSE timeless_image_source_url END,
                timeless_image_url = COALESCE(timeless_image_url, ?),
                timeless_media_title = CASE WHEN timeless_media_kind IS NULL
                    THEN ? ELSE timeless_media_title END,
                timeless_media_embed_url = CASE WHEN timeless_media_kind IS NULL
                    THEN ? ELSE timeless_media_embed_url END,
                timeless_media_external_url = CASE WHEN timeless_media_kind IS NULL
                    THEN ? ELSE timeless_media_external_url END,
                timeless_media_kind = COALESCE(timeless_media_kind, ?),
                timeless_blog_url = COALESCE(timeless_blog_url, ?),
                timeless_sales = COALESCE(timeless_sales, ?),
                updated_at = ?
            WHERE decade = ? AND region = ? AND art_form = ?
            "#,
        )
        .bind(patch.popular_image.as_ref().map(|i| i.source_url.clone()))
        .bind(patch.popular_image.as_ref().map(|i| i.url.clone()))
        .bind(patch.popular_media.as_ref().map(|m| m.title.clone()))
        .bind(patch.popular_media.as_ref().map(|m| m.embed_url.clone()))
        .bind(patch.popular_media.as_ref().map(|m| m.external_url.clone()))
        .bind(patch.popular_media.as_ref().map(|m| m.kind.as_str()))
        .bind(&patch.popular_blog_url)
        .bind(&patch.popular_sales)
        .bind(patch.timeless_image.as_ref().map(|i| i.source_url.clone()))
        .bind(patch.timeless_image.as_ref().map(|i| i.url.clone()))
        .bind(patch.timeless_media.as_ref().map(|m| m.title.clone()))
        .bind(patch.timeless_media.as_ref().map(|m| m.embed_url.clone()))
        .bind(patch.timeless_media.as_ref().map(|m| m.external_url.clone()))
        .bind(patch.timeless_media.as_ref().map(|m| m.kind.as_str()))
        .bind(&patch.timeless_blog_url)
        .bind(&patch.timeless_sales)
        .bind(&now)
        .bind(&key.decade)
        .bind(&key.region)
        .bind(&key.art_form)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => done.rows_affected() > 0,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache patch failed (database unavailable?)");
                false
            }
        }
    }

    /// Delete one cached key. Returns true if a row was deleted.
    pub async fn delete_one(&self, key: &ArtKey) -> bool {
        let result =
            sqlx::query("DELETE FROM art_cache WHERE decade = ? AND region = ? AND art_form = ?")
                .bind(&key.decade)
                .bind(&key.region)
                .bind(&key.art_form)
                .execute(&self.pool)
                .await;

        match result {
            Ok(done) => done.rows_affected() > 0,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache delete failed");
                false
            }
        }
    }

    /// Delete all cached data. Returns the number of deleted rows.
    pub async fn delete_all(&self) -> i64 {
        let result = sqlx::query("DELETE FROM art_cache").execute(&self.pool).await;

        match result {
            Ok(done) => done.rows_affected() as i64,
            Err(e) => {
                warn!(error = %e, "Cache clear failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    async fn test_store() -> ArtCacheStore {
        // Single connection: an in-memory database exists per connection
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        ArtCacheStore::new(pool)
    }

    fn sample_data() -> ArtData {
        ArtData {
            decade: "1960".to_string(),
            region: "Western Europe".to_string(),
            art_form: "Music".to_string(),
            popular: ArtEntry::new("Beat", "The Beatles", "She Loves You", "Everywhere at once."),
            timeless: ArtEntry::new("Rock", "The Rolling Stones", "Satisfaction", "Still on the radio."),
        }
    }

    fn sample_image() -> ArtImage {
        ArtImage {
            url: "https://images.example/thumb.jpg".to_string(),
            source_url: "https://museum.example/object/1".to_string(),
        }
    }

    fn sample_media() -> MediaRef {
        MediaRef {
            kind: MediaKind::Track,
            title: "She Loves You".to_string(),
            embed_url: "https://open.spotify.com/embed/track/abc".to_string(),
            external_url: "https://open.spotify.com/track/abc".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = test_store().await;
        let mut data = sample_data();
        data.popular.media = Some(sample_media());
        data.timeless.sales = Some("5 million copies sold".to_string());

        assert!(store.upsert(&data).await);
        let cached = store.get(&data.key()).await.unwrap();
        assert_eq!(cached, data);
    }

    #[tokio::test]
    async fn get_misses_on_unknown_key() {
        let store = test_store().await;
        assert!(store.get(&ArtKey::new("1850", "Oceania", "Dance")).await.is_none());
    }

    #[tokio::test]
    async fn upsert_overwrites_at_row_level() {
        let store = test_store().await;
        let mut data = sample_data();
        assert!(store.upsert(&data).await);

        data.popular.description = "Rewritten.".to_string();
        assert!(store.upsert(&data).await);

        let cached = store.get(&data.key()).await.unwrap();
        assert_eq!(cached.popular.description, "Rewritten.");
    }

    #[tokio::test]
    async fn patch_fills_absent_fields() {
        let store = test_store().await;
        let data = sample_data();
        store.upsert(&data).await;

        let patch = MediaPatch {
            popular_image: Some(sample_image()),
            timeless_blog_url: Some("https://blog.example/post".to_string()),
            ..Default::default()
        };
        assert!(store.patch_media(&data.key(), &patch).await);

        let cached = store.get(&data.key()).await.unwrap();
        assert_eq!(cached.popular.image, Some(sample_image()));
        assert_eq!(cached.timeless.blog_url.as_deref(), Some("https://blog.example/post"));
        // Untouched fields stay absent
        assert!(cached.popular.blog_url.is_none());
        assert!(cached.timeless.image.is_none());
    }

    #[tokio::test]
    async fn patch_never_clobbers_present_fields() {
        let store = test_store().await;
        let mut data = sample_data();
        data.popular.blog_url = Some("https://blog.example/original".to_string());
        data.popular.media = Some(sample_media());
        store.upsert(&data).await;

        // A later patch with a different value must not replace it, and a
        // patch with the field absent must not clear it.
        let patch = MediaPatch {
            popular_blog_url: Some("https://blog.example/later".to_string()),
            popular_media: Some(MediaRef {
                kind: MediaKind::Video,
                title: "Other".to_string(),
                embed_url: "https://www.youtube.com/embed/x".to_string(),
                external_url: "https://www.youtube.com/watch?v=x".to_string(),
            }),
            ..Default::default()
        };
        assert!(store.patch_media(&data.key(), &patch).await);

        let cached = store.get(&data.key()).await.unwrap();
        assert_eq!(cached.popular.blog_url.as_deref(), Some("https://blog.example/original"));
        assert_eq!(cached.popular.media, Some(sample_media()));

        let empty_patch = MediaPatch {
            popular_sales: Some("1 million copies sold".to_string()),
            ..Default::default()
        };
        store.patch_media(&data.key(), &empty_patch).await;
        let cached = store.get(&data.key()).await.unwrap();
        assert_eq!(cached.popular.blog_url.as_deref(), Some("https://blog.example/original"));
        assert_eq!(cached.popular.sales.as_deref(), Some("1 million copies sold"));
    }

    #[tokio::test]
    async fn patch_missing_row_reports_false() {
        let store = test_store().await;
        let patch = MediaPatch {
            popular_blog_url: Some("https://blog.example/post".to_string()),
            ..Default::default()
        };
        assert!(!store.patch_media(&ArtKey::new("1700", "Nowhere", "Opera"), &patch).await);
    }

    #[tokio::test]
    async fn empty_patch_is_a_no_op() {
        let store = test_store().await;
        let data = sample_data();
        store.upsert(&data).await;
        assert!(!store.patch_media(&data.key(), &MediaPatch::default()).await);
    }

    #[tokio::test]
    async fn delete_one_and_delete_all() {
        let store = test_store().await;
        let data = sample_data();
        store.upsert(&data).await;

        let mut other = sample_data();
        other.decade = "1970".to_string();
        store.upsert(&other).await;

        assert!(store.delete_one(&data.key()).await);
        assert!(!store.delete_one(&data.key()).await);
        assert_eq!(store.delete_all().await, 1);
        assert_eq!(store.delete_all().await, 0);
    }

    #[tokio::test]
    async fn storage_failure_degrades_not_panics() {
        let store = test_store().await;
        let data = sample_data();
        store.upsert(&data).await;

        // Simulate an unreachable database
        store.pool.close().await;

        assert!(store.get(&data.key()).await.is_none());
        assert!(!store.upsert(&data).await);
        let patch = MediaPatch {
            popular_blog_url: Some("https://blog.example/post".to_string()),
            ..Default::default()
        };
        assert!(!store.patch_media(&data.key(), &patch).await);
        assert!(!store.delete_one(&data.key()).await);
        assert_eq!(store.delete_all().await, 0);
    }
}
