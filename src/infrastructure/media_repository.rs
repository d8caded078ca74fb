//! SQLite implementation of the media record store
//!
//! Video rows are unique by `url` (canonical locator), image rows by
//! `(url, source_url, tag)`. Both constraints are enforced by the schema created
//! in `DatabaseConnection::migrate`.

#![allow(clippy::uninlined_format_args)]

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::canonical_locator::CanonicalLocator;
use crate::domain::media_record::{ImageKey, ImageRecord, VideoRecord};
use crate::domain::repositories::{
    ImageInsertOutcome, LibraryStatistics, MediaRecordStore, StoreError, UpsertMode, UpsertOutcome,
};
use crate::domain::resolution::SaveAction;

/// Keeps `IN (...)` lists well below SQLite's bound-parameter limit.
const KEY_LOOKUP_CHUNK: usize = 400;

#[derive(Clone)]
pub struct SqliteMediaRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ===============================
    // ROW MAPPING
    // ===============================

    fn row_to_video(row: &SqliteRow) -> Result<VideoRecord, StoreError> {
        let url: String = row.try_get("url")?;
        let views: Option<i64> = row.try_get("views")?;
        let tags_json: String = row.try_get("tags")?;
        let tags: Vec<String> = serde_json::from_str(&tags_json)
            .map_err(|e| StoreError::Malformed(format!("tags of '{}': {}", url, e)))?;

        Ok(VideoRecord {
            locator: CanonicalLocator::normalize(&url),
            title: row.try_get("title")?,
            view_count: views.and_then(|v| u64::try_from(v).ok()),
            thumbnail_locator: row.try_get("thumbnail")?,
            brand_label: row.try_get("brand")?,
            playlist_label: row.try_get("playlist")?,
            release_date: row.try_get("release_date")?,
            plot_text: row.try_get("plot")?,
            tags,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_image(row: &SqliteRow) -> Result<ImageRecord, StoreError> {
        let source_url: String = row.try_get("source_url")?;
        Ok(ImageRecord {
            member_locator: row.try_get("url")?,
            label: row.try_get("tag")?,
            comments: row.try_get("comments")?,
            owner_locator: CanonicalLocator::normalize(&source_url),
            saved_at: row.try_get("saved_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn map_write_error(err: sqlx::Error, key: &str) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::ConstraintViolation {
                    key: key.to_string(),
                };
            }
        }
        StoreError::Io(err)
    }

    // ===============================
    // VIDEO OPERATIONS
    // ===============================

    async fn insert_video(&self, record: &VideoRecord, tags_json: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO videos
            (url, title, views, thumbnail, brand, playlist, release_date, plot, tags, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.locator.as_str())
        .bind(&record.title)
        .bind(record.view_count.and_then(|v| i64::try_from(v).ok()))
        .bind(&record.thumbnail_locator)
        .bind(&record.brand_label)
        .bind(&record.playlist_label)
        .bind(&record.release_date)
        .bind(&record.plot_text)
        .bind(tags_json)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, record.locator.as_str()))?;

        Ok(result.rows_affected())
    }

    async fn update_video(&self, record: &VideoRecord, tags_json: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET title = ?, views = ?, thumbnail = ?, brand = ?, playlist = ?,
                release_date = ?, plot = ?, tags = ?, updated_at = ?
            WHERE url = ?
            "#,
        )
        .bind(&record.title)
        .bind(record.view_count.and_then(|v| i64::try_from(v).ok()))
        .bind(&record.thumbnail_locator)
        .bind(&record.brand_label)
        .bind(&record.playlist_label)
        .bind(&record.release_date)
        .bind(&record.plot_text)
        .bind(tags_json)
        .bind(record.updated_at)
        .bind(record.locator.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, record.locator.as_str()))?;

        Ok(result.rows_affected())
    }

    // ===============================
    // IMAGE OPERATIONS
    // ===============================

    async fn insert_image_or_ignore(&self, record: &ImageRecord) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO images (url, tag, comments, source_url, saved_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.member_locator)
        .bind(&record.label)
        .bind(&record.comments)
        .bind(record.owner_locator.as_str())
        .bind(record.saved_at)
        .bind(record.created_at)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All images saved from one owner page, oldest first.
    pub async fn list_images_for_owner(
        &self,
        owner_locator: &CanonicalLocator,
    ) -> Result<Vec<ImageRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT url, tag, comments, source_url, saved_at, created_at
            FROM images
            WHERE source_url = ?
            ORDER BY id ASC
            "#,
        )
        .bind(owner_locator.as_str())
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(Self::row_to_image).collect()
    }
}

#[async_trait]
impl MediaRecordStore for SqliteMediaRepository {
    async fn find_video_by_locator(
        &self,
        locator: &CanonicalLocator,
    ) -> Result<Option<VideoRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT url, title, views, thumbnail, brand, playlist, release_date, plot, tags,
                   created_at, updated_at
            FROM videos
            WHERE url = ?
            "#,
        )
        .bind(locator.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        row.as_ref().map(Self::row_to_video).transpose()
    }

    async fn upsert_video(
        &self,
        record: &VideoRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, StoreError> {
        if record.locator.is_empty() {
            return Err(StoreError::EmptyLocator);
        }
        let tags_json = serde_json::to_string(&record.tags)
            .map_err(|e| StoreError::Malformed(format!("tags of '{}': {}", record.locator, e)))?;

        let outcome = match mode {
            UpsertMode::Insert => UpsertOutcome {
                action: SaveAction::Inserted,
                rows_affected: self.insert_video(record, &tags_json).await?,
            },
            UpsertMode::Update => UpsertOutcome {
                action: SaveAction::Updated,
                rows_affected: self.update_video(record, &tags_json).await?,
            },
        };
        debug!(
            "Video {} {} ({} rows)",
            record.locator, outcome.action, outcome.rows_affected
        );
        Ok(outcome)
    }

    async fn find_images_by_keys(&self, keys: &[ImageKey]) -> Result<Vec<ImageRecord>, StoreError> {
        let mut groups: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
        for key in keys {
            groups
                .entry((key.owner_locator.as_str(), key.label.as_str()))
                .or_default()
                .push(key.member_locator.as_str());
        }

        let mut found = Vec::new();
        for ((owner, label), members) in groups {
            for chunk in members.chunks(KEY_LOOKUP_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!(
                    "SELECT url, tag, comments, source_url, saved_at, created_at \
                     FROM images WHERE source_url = ? AND tag = ? AND url IN ({})",
                    placeholders
                );
                let mut query = sqlx::query(&sql).bind(owner).bind(label);
                for member in chunk {
                    query = query.bind(*member);
                }
                let rows = query.fetch_all(&*self.pool).await?;
                for row in &rows {
                    found.push(Self::row_to_image(row)?);
                }
            }
        }
        Ok(found)
    }

    async fn insert_images_ignoring_duplicates(
        &self,
        records: &[ImageRecord],
    ) -> Result<ImageInsertOutcome, StoreError> {
        let mut outcome = ImageInsertOutcome::default();
        for record in records {
            if record.member_locator.trim().is_empty() || record.owner_locator.is_empty() {
                warn!("Skipping image with empty locator (label '{}')", record.label);
                outcome.skipped += 1;
                continue;
            }
            match self.insert_image_or_ignore(record).await {
                Ok(true) => outcome.saved += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    warn!("Failed to save image {}: {}", record.member_locator, e);
                    outcome.skipped += 1;
                }
            }
        }
        debug!(
            "Image batch written: {} saved, {} skipped",
            outcome.saved, outcome.skipped
        );
        Ok(outcome)
    }

    async fn list_distinct_playlist_labels(&self) -> Result<Vec<String>, StoreError> {
        let labels: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT playlist FROM videos
            WHERE playlist IS NOT NULL AND TRIM(playlist) != ''
            ORDER BY playlist ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;
        Ok(labels)
    }

    async fn statistics(&self) -> Result<LibraryStatistics, StoreError> {
        let (videos, images, playlists, size): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM videos),
                (SELECT COUNT(*) FROM images),
                (SELECT COUNT(DISTINCT playlist) FROM videos
                    WHERE playlist IS NOT NULL AND TRIM(playlist) != ''),
                (SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size())
            "#,
        )
        .fetch_one(&*self.pool)
        .await?;

        let to_u64 = |v: i64| u64::try_from(v).unwrap_or_default();
        Ok(LibraryStatistics {
            total_videos: to_u64(videos),
            total_images: to_u64(images),
            total_playlists: to_u64(playlists),
            database_size_bytes: to_u64(size),
        })
    }
}
