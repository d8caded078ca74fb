//! Media records persisted in the library
//!
//! `VideoRecord` is keyed by its canonical page locator, `ImageRecord` by the
//! (member locator, owner locator, label) triple.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use ts_rs::TS;

use super::canonical_locator::CanonicalLocator;

/// Scraped tags are capped before de-duplication.
pub const MAX_SCRAPED_TAGS: usize = 10;

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+").expect("leading number pattern is valid"));

/// 비디오 메타데이터 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VideoRecord {
    pub locator: CanonicalLocator,
    pub title: Option<String>,
    pub view_count: Option<u64>,
    pub thumbnail_locator: Option<String>,
    pub brand_label: Option<String>,
    pub playlist_label: Option<String>,
    pub release_date: Option<String>,
    pub plot_text: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Empty record for `locator` with both timestamps set to `now`.
    pub fn new(locator: CanonicalLocator, now: DateTime<Utc>) -> Self {
        Self {
            locator,
            title: None,
            view_count: None,
            thumbnail_locator: None,
            brand_label: None,
            playlist_label: None,
            release_date: None,
            plot_text: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Every mutable field comes from `candidate`; identity and `created_at` stay.
    pub fn overwritten_by(&self, candidate: &Self, now: DateTime<Utc>) -> Self {
        Self {
            locator: self.locator.clone(),
            created_at: self.created_at,
            updated_at: now,
            ..candidate.clone()
        }
    }
}

/// Raw values pulled off a video page before conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScrapedVideo {
    pub url: String,
    pub title: Option<String>,
    pub views_text: Option<String>,
    pub thumbnail: Option<String>,
    pub brand: Option<String>,
    pub release_date: Option<String>,
    pub plot: Option<String>,
    pub playlist: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ScrapedVideo {
    /// Names of the page elements the scraper could not find.
    pub fn missing_elements(&self) -> Vec<&'static str> {
        let checks = [
            ("title", self.title.is_none()),
            ("views", self.views_text.is_none()),
            ("thumbnail", self.thumbnail.is_none()),
            ("brand", self.brand.is_none()),
            ("release_date", self.release_date.is_none()),
            ("plot", self.plot.is_none()),
            ("tags", self.tags.is_empty()),
        ];
        checks
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn into_record(self, now: DateTime<Utc>) -> VideoRecord {
        let view_count = self.views_text.as_deref().and_then(parse_view_count);
        let tags = dedup_tags(self.tags);
        VideoRecord {
            locator: CanonicalLocator::normalize(&self.url),
            title: non_blank(self.title),
            view_count,
            thumbnail_locator: non_blank(self.thumbnail),
            brand_label: non_blank(self.brand),
            playlist_label: non_blank(self.playlist),
            release_date: non_blank(self.release_date),
            plot_text: non_blank(self.plot),
            tags,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Parse a free-text view count such as `"12,345 views"`.
///
/// Returns `None` when no leading digits are present; never defaults to zero.
pub fn parse_view_count(text: &str) -> Option<u64> {
    let token = text.split_whitespace().next()?.replace(',', "");
    LEADING_NUMBER
        .find(&token)
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .take(MAX_SCRAPED_TAGS)
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 이미지 레코드 (갤러리 페이지에서 선택된 개별 이미지)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImageRecord {
    pub member_locator: String,
    pub label: String,
    pub comments: Option<String>,
    pub owner_locator: CanonicalLocator,
    pub saved_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    pub fn key(&self) -> ImageKey {
        ImageKey {
            member_locator: self.member_locator.clone(),
            owner_locator: self.owner_locator.clone(),
            label: self.label.clone(),
        }
    }
}

/// Uniqueness key of an image record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageKey {
    pub member_locator: String,
    pub owner_locator: CanonicalLocator,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Tag is required!")]
pub struct MissingLabel;

/// Label and optional comments shared by every member of an image batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLabel {
    label: String,
    comments: Option<String>,
}

impl BatchLabel {
    /// Blank labels are rejected; blank comments become `None`.
    pub fn new(label: &str, comments: Option<&str>) -> Result<Self, MissingLabel> {
        let label = label.trim();
        if label.is_empty() {
            return Err(MissingLabel);
        }
        let comments = comments
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToString::to_string);
        Ok(Self {
            label: label.to_string(),
            comments,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }
}

/// Candidate set for one bulk image save: distinct member locators sharing
/// one owner page and one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBatch {
    members: Vec<String>,
    owner_locator: CanonicalLocator,
    label: BatchLabel,
}

impl ImageBatch {
    /// Blank member locators are dropped and repeats collapse, keeping first-seen order.
    pub fn new<I, S>(members: I, owner_locator: CanonicalLocator, label: BatchLabel) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let members = members
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| !m.trim().is_empty() && seen.insert(m.clone()))
            .collect();
        Self {
            members,
            owner_locator,
            label,
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn owner_locator(&self) -> &CanonicalLocator {
        &self.owner_locator
    }

    pub fn label(&self) -> &BatchLabel {
        &self.label
    }

    pub fn key_for(&self, member: &str) -> ImageKey {
        ImageKey {
            member_locator: member.to_string(),
            owner_locator: self.owner_locator.clone(),
            label: self.label.label.clone(),
        }
    }

    pub fn keys(&self) -> Vec<ImageKey> {
        self.members.iter().map(|m| self.key_for(m)).collect()
    }

    pub fn record_for(&self, member: &str, now: DateTime<Utc>) -> ImageRecord {
        ImageRecord {
            member_locator: member.to_string(),
            label: self.label.label.clone(),
            comments: self.label.comments.clone(),
            owner_locator: self.owner_locator.clone(),
            saved_at: now,
            created_at: now,
        }
    }

    pub fn records(&self, now: DateTime<Utc>) -> Vec<ImageRecord> {
        self.members.iter().map(|m| self.record_for(m, now)).collect()
    }
}
