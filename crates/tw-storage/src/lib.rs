//! Visit log, firewall rules, settings and bookmarks.
//!
//! Two implementations share one set of traits: [`SqliteStore`] persists to
//! a local database, [`IncognitoStore`] keeps firewall rules in memory and
//! drops everything else. Every operation fails soft: storage errors are
//! logged and turned into `false`, an empty list or the caller's default.

mod incognito;
mod sqlite;

use chrono::DateTime;
use chrono::Utc;
use core::fmt;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub use incognito::IncognitoStore;
pub use sqlite::SqliteStore;

/// Geolocation is not implemented; every visit carries this value.
pub const UNKNOWN_LOCATION: &str = "Unknown";
pub const DEFAULT_BLOCK_REASON: &str = "Manually blocked";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitRecord {
    pub url: String,
    pub title: Option<String>,
    /// Display address; `Unknown` when resolution failed.
    pub ip_address: String,
    pub location: String,
    pub visited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRule {
    pub domain: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub url: String,
    pub title: Option<String>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    Open { path: PathBuf, message: String },
    Query { operation: &'static str, message: String },
}

impl PersistenceError {
    pub(crate) fn query(operation: &'static str, error: &rusqlite::Error) -> Self {
        Self::Query {
            operation,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, message } => {
                write!(f, "failed to open store `{}`: {message}", path.display())
            }
            Self::Query { operation, message } => write!(f, "{operation} failed: {message}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

pub trait VisitStore: Send + Sync {
    /// Appends a visit. Empty, `about:blank` and host-less URLs are skipped
    /// and still count as success.
    fn record_visit(&self, url: &str, title: Option<&str>) -> bool;

    /// Most recent first.
    fn recent_visits(&self, limit: usize) -> Vec<VisitRecord>;
}

pub trait FirewallStore: Send + Sync {
    /// Matches `url` against the cached blocked-domain set.
    fn is_blocked(&self, url: &str) -> bool;

    /// Upserts a rule for the host of `domain`, which may also be a URL.
    fn block(&self, domain: &str, reason: Option<&str>) -> bool;

    fn unblock(&self, domain: &str) -> bool;

    fn blocked_domains(&self) -> BTreeSet<String>;

    /// Ordered by domain.
    fn block_rules(&self) -> Vec<BlockRule>;
}

pub trait SettingsStore: Send + Sync {
    fn get_setting(&self, key: &str, default: &str) -> String;

    fn save_setting(&self, key: &str, value: &str) -> bool;
}

pub trait BookmarkStore: Send + Sync {
    /// Upsert keyed by URL.
    fn add_bookmark(&self, url: &str, title: Option<&str>) -> bool;

    fn remove_bookmark(&self, url: &str) -> bool;

    /// Ordered by title.
    fn bookmarks(&self) -> Vec<Bookmark>;
}

/// Everything a browsing session needs from storage.
pub trait BrowserStore: VisitStore + FirewallStore + SettingsStore + BookmarkStore {}

impl<T> BrowserStore for T where T: VisitStore + FirewallStore + SettingsStore + BookmarkStore {}

/// Host of a URL worth recording, or `None` for URLs that are never logged.
pub(crate) fn recordable_host(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() || url == "about:blank" {
        return None;
    }
    tw_core::Location::parse(url)
        .ok()
        .map(|location| location.domain().to_owned())
        .filter(|domain| !domain.is_empty())
}

#[cfg(test)]
mod tests {
    use super::PersistenceError;
    use super::recordable_host;

    #[test]
    fn blank_and_hostless_urls_are_not_recordable() {
        assert_eq!(recordable_host(""), None);
        assert_eq!(recordable_host("  "), None);
        assert_eq!(recordable_host("about:blank"), None);
        assert_eq!(recordable_host("not a url"), None);
        assert_eq!(
            recordable_host("https://Docs.Example.com/a"),
            Some("docs.example.com".to_owned())
        );
    }

    #[test]
    fn errors_display_their_operation() {
        let error = PersistenceError::Query {
            operation: "record visit",
            message: "disk I/O error".to_owned(),
        };
        assert_eq!(error.to_string(), "record visit failed: disk I/O error");
    }
}
