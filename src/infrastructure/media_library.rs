//! Runtime-configurable media library
//!
//! The database location is chosen by the user and may be absent or replaced
//! while the application runs. Until a path is configured every write reports
//! [`StoreError::NotConfigured`] and read-only lookups return empty results.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};
use ts_rs::TS;

use super::config::UserConfig;
use super::database_connection::DatabaseConnection;
use super::media_repository::SqliteMediaRepository;
use crate::domain::canonical_locator::CanonicalLocator;
use crate::domain::media_record::{ImageKey, ImageRecord, VideoRecord};
use crate::domain::repositories::{
    ImageInsertOutcome, LibraryStatistics, MediaRecordStore, StoreError, UpsertMode, UpsertOutcome,
};

/// 데이터베이스 상태 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DatabaseStatus {
    pub configured: bool,
    pub path: Option<String>,
    pub exists: bool,
    pub size_bytes: u64,
}

#[derive(Default)]
struct LibraryState {
    path: Option<PathBuf>,
    repository: Option<SqliteMediaRepository>,
}

#[derive(Default)]
pub struct MediaLibrary {
    state: RwLock<LibraryState>,
}

impl MediaLibrary {
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Open (creating if needed) the library stored at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let library = Self::unconfigured();
        library.configure(path).await?;
        Ok(library)
    }

    /// Open the library named by the user configuration. Failures leave the
    /// library unconfigured so the application can still start.
    pub async fn from_config(user: &UserConfig) -> Self {
        let library = Self::unconfigured();
        match user.database_path.as_deref() {
            Some(path) => {
                if let Err(e) = library.configure(path).await {
                    warn!("Configured database could not be opened: {:#}", e);
                }
            }
            None => info!("No database path configured; library starts unconfigured"),
        }
        library
    }

    /// Point the library at `path`, creating the file and schema when missing.
    /// A previously open database is closed after the switch.
    pub async fn configure(&self, path: &Path) -> Result<()> {
        let connection = DatabaseConnection::open_file(path)
            .await
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        connection
            .migrate()
            .await
            .context("Failed to prepare database schema")?;
        let repository = SqliteMediaRepository::new(connection.into_pool());

        let previous = {
            let mut state = self.state.write().await;
            state.path = Some(path.to_path_buf());
            state.repository.replace(repository)
        };
        if let Some(previous) = previous {
            previous.close().await;
        }

        info!("📚 Media library configured at {}", path.display());
        Ok(())
    }

    /// Close the current database. The library becomes unconfigured.
    pub async fn close(&self) {
        let previous = {
            let mut state = self.state.write().await;
            state.path = None;
            state.repository.take()
        };
        if let Some(repository) = previous {
            repository.close().await;
            info!("Media library closed");
        }
    }

    pub async fn is_configured(&self) -> bool {
        self.state.read().await.repository.is_some()
    }

    pub async fn database_path(&self) -> Option<PathBuf> {
        self.state.read().await.path.clone()
    }

    pub async fn status(&self) -> DatabaseStatus {
        let (configured, path) = {
            let state = self.state.read().await;
            (state.repository.is_some(), state.path.clone())
        };
        let metadata = match &path {
            Some(p) => tokio::fs::metadata(p).await.ok(),
            None => None,
        };
        DatabaseStatus {
            configured,
            path: path.map(|p| p.display().to_string()),
            exists: metadata.is_some(),
            size_bytes: metadata.map(|m| m.len()).unwrap_or_default(),
        }
    }

    async fn repository(&self) -> Option<SqliteMediaRepository> {
        self.state.read().await.repository.clone()
    }

    async fn require_repository(&self) -> Result<SqliteMediaRepository, StoreError> {
        self.repository().await.ok_or(StoreError::NotConfigured)
    }
}

#[async_trait]
impl MediaRecordStore for MediaLibrary {
    async fn find_video_by_locator(
        &self,
        locator: &CanonicalLocator,
    ) -> Result<Option<VideoRecord>, StoreError> {
        match self.repository().await {
            Some(repository) => repository.find_video_by_locator(locator).await,
            None => Ok(None),
        }
    }

    async fn upsert_video(
        &self,
        record: &VideoRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, StoreError> {
        self.require_repository()
            .await?
            .upsert_video(record, mode)
            .await
    }

    async fn find_images_by_keys(&self, keys: &[ImageKey]) -> Result<Vec<ImageRecord>, StoreError> {
        match self.repository().await {
            Some(repository) => repository.find_images_by_keys(keys).await,
            None => Ok(Vec::new()),
        }
    }

    async fn insert_images_ignoring_duplicates(
        &self,
        records: &[ImageRecord],
    ) -> Result<ImageInsertOutcome, StoreError> {
        self.require_repository()
            .await?
            .insert_images_ignoring_duplicates(records)
            .await
    }

    async fn list_distinct_playlist_labels(&self) -> Result<Vec<String>, StoreError> {
        match self.repository().await {
            Some(repository) => repository.list_distinct_playlist_labels().await,
            None => Ok(Vec::new()),
        }
    }

    async fn statistics(&self) -> Result<LibraryStatistics, StoreError> {
        self.require_repository().await?.statistics().await
    }
}
