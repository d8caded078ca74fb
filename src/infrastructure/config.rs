//! Configuration infrastructure
//!
//! Contains configuration loading and management for media-harvest.
//!
//! Configuration is organized into tiers:
//! 1. User-configurable settings (exposed in UI): database location, logging
//! 2. Session and surface tuning (config file or environment only)
//! 3. Application-managed settings (auto-updated by app)
//!
//! Values are read from the JSON file and may be overridden by environment
//! variables prefixed with `MEDIA_HARVEST_`, using `__` between sections
//! (e.g. `MEDIA_HARVEST_SESSION__POLL_INTERVAL_MS=250`).

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

/// Default values shared by the `Default` impls below.
pub mod defaults {
    pub const POLL_INTERVAL_MS: u64 = 500;
    pub const BRIDGE_TIMEOUT_MS: u64 = 2_000;
    pub const BRIDGE_BUFFER_SIZE: usize = 32;
    pub const DECISION_BUFFER_SIZE: usize = 8;

    pub const VIDEO_PAGE_MARKER: &str = "/videos/";
    pub const IMAGE_PAGE_MARKER: &str = "/browse/images";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_MAX_FILES: u32 = 5;
    pub const LOG_AUTO_CLEANUP: bool = true;

    pub const CONFIG_VERSION: u32 = 1;
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// User-configurable settings (exposed in UI)
    pub user: UserConfig,

    /// Selection session timing and bridge transport
    pub session: SessionConfig,

    /// Page classification markers
    pub surface: SurfaceConfig,

    /// Application-managed settings (auto-updated)
    pub app_managed: AppManagedConfig,
}

/// User-configurable settings that can be changed from the UI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Library database file. `None` until the user picks a location.
    pub database_path: Option<PathBuf>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Timing of the selection session and its bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Display counter refresh interval while a session is active
    pub poll_interval_ms: u64,

    /// How long a single bridge call may wait for the surface
    pub bridge_timeout_ms: u64,

    /// Pending bridge commands before senders wait
    pub bridge_buffer_size: usize,

    /// Pending decision prompts before senders wait
    pub decision_buffer_size: usize,
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_millis(self.bridge_timeout_ms.max(1))
    }
}

/// Path markers used to classify the page shown in the surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub video_page_marker: String,
    pub image_page_marker: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs (file output only)
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

/// Application-managed settings that are automatically updated by the app
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppManagedConfig {
    /// Configuration version for migration purposes
    pub config_version: u32,

    /// Last database path the user opened, kept for the "recent" hint
    pub last_database_path: Option<PathBuf>,

    /// Timestamp of the last successful save
    pub last_saved_at: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            bridge_timeout_ms: defaults::BRIDGE_TIMEOUT_MS,
            bridge_buffer_size: defaults::BRIDGE_BUFFER_SIZE,
            decision_buffer_size: defaults::DECISION_BUFFER_SIZE,
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            video_page_marker: defaults::VIDEO_PAGE_MARKER.to_string(),
            image_page_marker: defaults::IMAGE_PAGE_MARKER.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("tokio".to_string(), "info".to_string());
                filters.insert("media_harvest_lib".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl Default for AppManagedConfig {
    fn default() -> Self {
        Self {
            config_version: defaults::CONFIG_VERSION,
            last_database_path: None,
            last_saved_at: None,
        }
    }
}

pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("media-harvest");

        Ok(config_dir)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join("media-harvest");

        Ok(data_dir)
    }

    /// Create a new configuration manager with automatic setup
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        let config_path = config_dir.join("media_harvest_config.json");

        Ok(Self { config_path })
    }

    /// Configuration manager bound to an explicit file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Initialize configuration system on first run
    pub async fn initialize_on_first_run(&self) -> Result<AppConfig> {
        let config_dir = self
            .config_path
            .parent()
            .context("Failed to get config directory")?;

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)
                .await
                .context("Failed to create config directory")?;
            info!("✅ Created configuration directory: {:?}", config_dir);
        }

        if self.config_path.exists() {
            let mut config = self.load_config().await?;
            self.migrate_config_if_needed(&mut config).await?;
            return Ok(config);
        }

        info!("🎉 First run detected - initializing default configuration");
        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;
        info!("✅ Initial configuration setup completed");
        Ok(default_config)
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        match Self::read_layered(&self.config_path) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration file could not be parsed: {:#}", parse_error);
                warn!("⚠️  Resetting to default configuration");

                // Create backup of corrupted config
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;

                info!("✅ Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// File values first, then `MEDIA_HARVEST_*` environment overrides.
    fn read_layered(path: &Path) -> Result<AppConfig> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Json))
            .add_source(
                config::Environment::with_prefix("MEDIA_HARVEST")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration sources")?;

        settings
            .try_deserialize::<AppConfig>()
            .context("Configuration does not match the expected format")
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Update app-managed settings
    pub async fn update_app_managed<F>(&self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut AppManagedConfig),
    {
        let mut config = self.load_config().await?;
        updater(&mut config.app_managed);
        self.save_config(&config).await
    }

    /// Update user configuration settings
    pub async fn update_user_config<F>(&self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut UserConfig),
    {
        let mut config = self.load_config().await?;
        updater(&mut config.user);
        self.save_config(&config).await
    }

    /// Record a newly chosen database location in both tiers
    pub async fn set_database_path(&self, path: &Path) -> Result<()> {
        let mut config = self.load_config().await?;
        config.user.database_path = Some(path.to_path_buf());
        config.app_managed.last_database_path = Some(path.to_path_buf());
        self.save_config(&config).await
    }

    /// Reset configuration to defaults (useful for troubleshooting)
    pub async fn reset_to_defaults(&self) -> Result<AppConfig> {
        info!("🔄 Resetting configuration to defaults");

        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;

        info!("✅ Configuration reset to defaults");
        Ok(default_config)
    }

    /// Migrate configuration from older versions
    pub async fn migrate_config_if_needed(&self, config: &mut AppConfig) -> Result<bool> {
        if config.app_managed.config_version >= defaults::CONFIG_VERSION {
            return Ok(false);
        }

        info!(
            "🔄 Migrating configuration from version {} to {}",
            config.app_managed.config_version,
            defaults::CONFIG_VERSION
        );
        // Version 0 files predate the session section; serde defaults filled it in.
        config.app_managed.config_version = defaults::CONFIG_VERSION;
        self.save_config(config).await?;
        Ok(true)
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}
