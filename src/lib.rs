//! Media Harvest - saving videos and image selections into a local library
//!
//! Captures video metadata and user-selected images from a browsed media site
//! into an SQLite library, resolving duplicates through user decisions.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::domain::MediaRecordStore;
use crate::infrastructure::logging::log_system_info;
use crate::infrastructure::{ConfigManager, MediaLibrary, init_logging_with_config};

/// Load configuration, start logging and report on the configured library.
pub async fn run() -> Result<()> {
    let config_manager = ConfigManager::new().context("Failed to create config manager")?;
    let config = config_manager
        .initialize_on_first_run()
        .await
        .context("Failed to initialize config")?;

    init_logging_with_config(config.user.logging.clone())?;
    log_system_info();
    info!("Configuration loaded from {:?}", config_manager.config_path());

    let library = MediaLibrary::from_config(&config.user).await;
    let status = library.status().await;
    info!(
        "Database status: configured={}, path={:?}, exists={}, size={} bytes",
        status.configured, status.path, status.exists, status.size_bytes
    );

    if !status.configured {
        warn!("No media library configured; set user.database_path to start saving");
        return Ok(());
    }

    match library.statistics().await {
        Ok(stats) => info!(
            "📊 Library: {} videos, {} images, {} playlists, {} bytes",
            stats.total_videos, stats.total_images, stats.total_playlists, stats.database_size_bytes
        ),
        Err(e) => warn!("Could not read library statistics: {}", e),
    }

    let playlists = library.list_distinct_playlist_labels().await?;
    if playlists.is_empty() {
        info!("No playlists yet");
    } else {
        info!("Playlists: {}", playlists.join(", "));
    }

    if let Some(path) = library.database_path().await {
        config_manager
            .update_app_managed(|managed| managed.last_database_path = Some(path))
            .await?;
    }

    library.close().await;
    Ok(())
}
