//! Logging system configuration and initialization
//!
//! This module provides the logging setup with:
//! - Console and file output support
//! - Configuration file based log level control
//! - Structured JSON logging (optional, file output)
//! - Old log file cleanup on startup
//! - Log files stored under the application data directory

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::ConfigManager;

const LOG_FILE_NAME: &str = "media-harvest.log";

// Global guard to keep the log file writer alive
static LOG_GUARDS: Lazy<Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Local wall-clock timestamps with millisecond precision
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Get the log directory under the application data directory, falling back
/// to a `logs` folder next to the executable.
pub fn get_log_directory() -> PathBuf {
    if let Ok(data_dir) = ConfigManager::get_app_data_dir() {
        return data_dir.join("logs");
    }
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LoggingConfig::default())
}

/// Build the filter: `RUST_LOG` wins; otherwise the configured level plus
/// module filters, with dependency noise suppressed unless TRACE is requested.
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut filter = EnvFilter::new(&config.level);
    let tracing_everything = config.level.to_lowercase().contains("trace");

    let mut directives: Vec<String> = Vec::new();
    if !tracing_everything {
        directives.extend(
            ["sqlx::query=warn", "sqlx::sqlite=warn", "tokio=info", "runtime=warn"]
                .iter()
                .map(ToString::to_string),
        );
        let mut modules: Vec<_> = config.module_filters.iter().collect();
        modules.sort();
        directives.extend(modules.into_iter().map(|(module, level)| format!("{}={}", module, level)));
    }

    for directive in directives {
        match directive.parse() {
            Ok(parsed) => filter = filter.add_directive(parsed),
            Err(e) => warn!("Ignoring invalid log directive '{}': {}", directive, e),
        }
    }
    filter
}

/// Initialize logging with custom configuration
///
/// # Environment Variable Override
/// ```bash
/// # Show all SQL queries even on DEBUG level
/// RUST_LOG="debug,sqlx::query=debug" media-harvest
/// ```
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    init_logging_in(&get_log_directory(), config)
}

/// Initialize logging writing files into `log_dir`
pub fn init_logging_in(log_dir: &Path, config: LoggingConfig) -> Result<()> {
    if config.file_output {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
        if config.auto_cleanup_logs {
            cleanup_old_logs(log_dir, config.max_files)?;
        }
    }

    let registry = Registry::default().with(build_env_filter(&config));

    match (config.file_output, config.console_output) {
        (true, console) => {
            let file_appender = rolling::never(log_dir, LOG_FILE_NAME);
            let (file_writer, file_guard) = non_blocking(file_appender);

            // Store the guard globally to prevent it from being dropped
            if let Ok(mut guards) = LOG_GUARDS.lock() {
                guards.push(file_guard);
            }

            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                let console_layer = console.then(|| {
                    fmt::Layer::new()
                        .with_writer(std::io::stdout)
                        .with_timer(LocalTimeFormatter)
                        .with_target(false)
                });
                registry.with(file_layer).with(console_layer).try_init()?;
            } else {
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(false)
                    .with_ansi(false);
                let console_layer = console.then(|| {
                    fmt::Layer::new()
                        .with_writer(std::io::stdout)
                        .with_timer(LocalTimeFormatter)
                        .with_target(false)
                });
                registry.with(file_layer).with(console_layer).try_init()?;
            }
        }
        (false, true) => {
            let console_layer = fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_timer(LocalTimeFormatter)
                .with_target(false);
            registry.with(console_layer).try_init()?;
        }
        (false, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    }

    info!("Logging system initialized");
    info!("Log directory: {:?}", log_dir);
    info!("Log level: {}", config.level);
    info!("JSON format: {}", config.json_format);
    info!("Console output: {}", config.console_output);
    info!("File output: {}", config.file_output);
    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Media Harvest System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("Log directory: {:?}", get_log_directory());
    info!("========================================");
}

/// Remove the oldest `.log` files so that at most `max_files` remain.
/// Returns the number of files removed.
pub fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path.extension().is_some_and(|ext| ext == "log");
        if !path.is_file() || !is_log {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    // Sort by modification time (newest first)
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let keep = max_files as usize;
    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        } else {
            removed += 1;
        }
    }
    if removed > 0 {
        info!("Removed {} old log files (keeping {})", removed, keep);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(config.console_output);
        assert!(config.file_output);
    }

    #[test]
    fn test_log_directory_is_named_logs() {
        let log_dir = get_log_directory();
        assert!(log_dir.to_string_lossy().ends_with("logs"));
    }

    #[test]
    fn test_cleanup_keeps_newest_files() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();
        for i in 0..4u64 {
            let path = dir.path().join(format!("old-{}.log", i));
            let file = std::fs::File::create(&path).unwrap();
            file.set_modified(now - Duration::from_secs(60 * (i + 1))).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        let removed = cleanup_old_logs(dir.path(), 2).unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("old-0.log").exists());
        assert!(dir.path().join("old-1.log").exists());
        assert!(!dir.path().join("old-3.log").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_env_filter_accepts_module_filters() {
        let mut config = LoggingConfig::default();
        config.module_filters.insert("not a valid directive!!".into(), "???".into());
        // Invalid entries are skipped rather than failing initialization.
        let _filter = build_env_filter(&config);
    }

    #[test]
    fn test_file_and_console_output_initializes_once() {
        let dir = tempdir().unwrap();
        let config = LoggingConfig {
            json_format: false,
            console_output: true,
            file_output: true,
            auto_cleanup_logs: false,
            ..LoggingConfig::default()
        };

        init_logging_in(dir.path(), config.clone()).unwrap();
        assert!(dir.path().join(LOG_FILE_NAME).exists());

        // 전역 subscriber는 프로세스당 한 번만 설치된다
        let json = LoggingConfig { json_format: true, ..config };
        assert!(init_logging_in(dir.path(), json).is_err());
    }
}
