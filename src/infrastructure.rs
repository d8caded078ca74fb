//! Infrastructure layer for storage, configuration, logging and the surface bridge

pub mod channel_bridge;
pub mod config; // Configuration file and layered overrides
pub mod database_connection;
pub mod logging; // Logging infrastructure
pub mod media_library;
pub mod media_repository;

// Re-export commonly used items
pub use channel_bridge::{BridgeError, ChannelBridge, SelectionSurface, SurfaceCommand, serve_surface};
pub use config::{
    AppConfig, AppManagedConfig, ConfigManager, LoggingConfig, SessionConfig, SurfaceConfig,
    UserConfig,
};
pub use database_connection::DatabaseConnection;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use media_library::{DatabaseStatus, MediaLibrary};
pub use media_repository::SqliteMediaRepository;
