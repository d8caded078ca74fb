//! Canonical identity for page locators
//!
//! 같은 페이지를 가리키는 URL은 쿼리/프래그먼트/대소문자와 무관하게 하나의 키로 취급한다.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Normalized identity string used as the dedup key for pages.
///
/// Two raw locators that differ only by query string, fragment, or letter case
/// normalize to the same value. An empty raw locator normalizes to an empty
/// identity, which the persistence layer refuses to store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct CanonicalLocator(String);

impl CanonicalLocator {
    /// Strip everything from the first `?` or `#` onward, then lowercase.
    pub fn normalize(raw: &str) -> Self {
        let end = raw.find(['?', '#']).unwrap_or(raw.len());
        Self(raw[..end].to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalLocator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
