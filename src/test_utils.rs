//! Test utilities for media-harvest
//!
//! Provides common testing infrastructure and utilities to ensure tests
//! are isolated, reliable, and use consistent database setup patterns.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use crate::application::DuplicateResolver;
use crate::domain::{CanonicalLocator, VideoRecord};
use crate::infrastructure::{DatabaseConnection, SqliteMediaRepository};

/// Test database configuration
pub struct TestDatabase {
    pub connection: DatabaseConnection,
}

impl TestDatabase {
    /// Create a new in-memory test database
    ///
    /// This ensures tests are isolated and don't interfere with each other.
    /// Each test gets a fresh, clean database state.
    pub async fn new() -> Result<Self> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(Self { connection: db })
    }

    /// Get the database pool for use in repositories
    pub fn pool(&self) -> sqlx::Pool<sqlx::Sqlite> {
        self.connection.pool().clone()
    }

    pub fn media_repository(&self) -> SqliteMediaRepository {
        SqliteMediaRepository::new(self.pool())
    }

    pub fn resolver(&self) -> DuplicateResolver {
        DuplicateResolver::new(Arc::new(self.media_repository()))
    }
}

/// Video record with a title, as a page scrape would produce it.
pub fn sample_video(raw_locator: &str, title: &str) -> VideoRecord {
    let mut record = VideoRecord::new(CanonicalLocator::normalize(raw_locator), Utc::now());
    record.title = Some(title.to_string());
    record
}
