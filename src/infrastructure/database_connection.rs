// Database connection and pool management
// This module handles SQLite database connections using sqlx

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_path = if database_url.starts_with("sqlite://") {
            database_url.trim_start_matches("sqlite://")
        } else if database_url.starts_with("sqlite:") {
            database_url.trim_start_matches("sqlite:")
        } else {
            database_url
        };
        let in_memory = db_path.starts_with(":memory:");

        // Create database file directory if it doesn't exist
        if !in_memory {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory: {parent:?}"))?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {database_url}"))?
            .create_if_missing(true);

        // Every connection to `:memory:` opens a separate database, so the
        // single connection must never be recycled.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(10)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {database_url}"))?;

        debug!("Opened database pool for {}", database_url);
        Ok(Self { pool })
    }

    /// Open the database file at `path`, creating it when missing.
    pub async fn open_file(path: &Path) -> Result<Self> {
        let url = format!("sqlite:{}", path.display());
        Self::new(&url).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_pool(self) -> SqlitePool {
        self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_videos_sql = r#"
            CREATE TABLE IF NOT EXISTS videos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                title TEXT,
                views INTEGER,
                thumbnail TEXT,
                brand TEXT,
                playlist TEXT,
                release_date TEXT,
                plot TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
        "#;

        let create_images_sql = r#"
            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                tag TEXT NOT NULL,
                comments TEXT,
                source_url TEXT NOT NULL,
                saved_at DATETIME NOT NULL,
                created_at DATETIME NOT NULL,
                UNIQUE (url, source_url, tag)
            )
        "#;

        sqlx::query(create_videos_sql)
            .execute(&self.pool)
            .await
            .context("Failed to create videos table")?;
        sqlx::query(create_images_sql)
            .execute(&self.pool)
            .await
            .context("Failed to create images table")?;

        // Create indexes for better performance
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_videos_playlist ON videos (playlist)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_images_source ON images (source_url, tag)")
            .execute(&self.pool)
            .await?;

        info!("Database schema ready (videos, images)");
        Ok(())
    }
}
