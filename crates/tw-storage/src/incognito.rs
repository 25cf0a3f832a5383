use crate::BlockRule;
use crate::Bookmark;
use crate::BookmarkStore;
use crate::DEFAULT_BLOCK_REASON;
use crate::FirewallStore;
use crate::SettingsStore;
use crate::VisitRecord;
use crate::VisitStore;
use chrono::Utc;
use log::debug;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::PoisonError;
use std::sync::RwLock;
use tw_core::firewall;

/// Store that leaves no trace: visits and settings are accepted and
/// discarded, firewall rules live only as long as the process.
#[derive(Debug, Default)]
pub struct IncognitoStore {
    rules: RwLock<BTreeMap<String, BlockRule>>,
}

impl IncognitoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VisitStore for IncognitoStore {
    fn record_visit(&self, url: &str, _title: Option<&str>) -> bool {
        debug!("incognito: not recording {url}");
        true
    }

    fn recent_visits(&self, _limit: usize) -> Vec<VisitRecord> {
        Vec::new()
    }
}

impl FirewallStore for IncognitoStore {
    fn is_blocked(&self, url: &str) -> bool {
        firewall::is_blocked(url, &self.blocked_domains())
    }

    fn block(&self, domain: &str, reason: Option<&str>) -> bool {
        let Some(domain) = firewall::canonical_domain(domain) else {
            return false;
        };
        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(DEFAULT_BLOCK_REASON);

        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                domain.clone(),
                BlockRule {
                    domain,
                    reason: Some(reason.to_owned()),
                    created_at: Utc::now(),
                },
            );
        true
    }

    fn unblock(&self, domain: &str) -> bool {
        let Some(domain) = firewall::canonical_domain(domain) else {
            return false;
        };
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&domain)
            .is_some()
    }

    fn blocked_domains(&self) -> BTreeSet<String> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn block_rules(&self) -> Vec<BlockRule> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl SettingsStore for IncognitoStore {
    fn get_setting(&self, _key: &str, default: &str) -> String {
        default.to_owned()
    }

    fn save_setting(&self, _key: &str, _value: &str) -> bool {
        true
    }
}

impl BookmarkStore for IncognitoStore {
    fn add_bookmark(&self, _url: &str, _title: Option<&str>) -> bool {
        false
    }

    fn remove_bookmark(&self, _url: &str) -> bool {
        false
    }

    fn bookmarks(&self) -> Vec<Bookmark> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::IncognitoStore;
    use crate::BookmarkStore;
    use crate::FirewallStore;
    use crate::SettingsStore;
    use crate::SqliteStore;
    use crate::VisitStore;
    use std::sync::Arc;
    use std::thread;
    use tw_core::lookup::NoLookup;

    #[test]
    fn every_write_reports_success_but_reads_stay_empty() {
        let store = IncognitoStore::new();
        assert!(store.record_visit("http://a.test/", Some("A")));
        assert!(store.recent_visits(10).is_empty());

        assert!(store.save_setting("search_engine", "duckduckgo"));
        assert_eq!(store.get_setting("search_engine", "google"), "google");

        assert!(!store.add_bookmark("http://a.test/", Some("A")));
        assert!(store.bookmarks().is_empty());
    }

    #[test]
    fn firewall_works_in_memory() {
        let store = IncognitoStore::new();
        assert!(store.block("example.com", Some("first")));
        assert!(store.block("EXAMPLE.com", Some("second")));
        assert!(store.is_blocked("http://sub.example.com/x"));

        let rules = store.block_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].reason.as_deref(), Some("second"));

        assert!(store.unblock("example.com"));
        assert!(!store.is_blocked("http://sub.example.com/x"));
    }

    #[test]
    fn no_durable_trace_is_left() {
        let directory = match tempfile::tempdir() {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let path = directory.path().join("textweb.db");

        // A durable store already exists at the same path.
        assert!(SqliteStore::open(&path, Arc::new(NoLookup)).is_ok());

        let incognito = IncognitoStore::new();
        assert!(incognito.block("example.com", None));
        assert!(incognito.record_visit("http://example.org/", Some("Example")));
        assert!(incognito.save_setting("theme", "dark"));

        let durable = SqliteStore::open(&path, Arc::new(NoLookup));
        assert!(durable.is_ok());
        let durable = match durable {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(durable.recent_visits(10).is_empty());
        assert!(durable.blocked_domains().is_empty());
        assert_eq!(durable.get_setting("theme", "light"), "light");
        assert!(IncognitoStore::new().blocked_domains().is_empty());
    }

    #[test]
    fn concurrent_rule_changes_stay_whole() {
        let store = IncognitoStore::new();
        assert!(store.block("stable.test", None));

        thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    assert!(store.block("flip.test", Some("flaky")));
                    assert!(store.unblock("flip.test"));
                    assert!(store.record_visit("http://flip.test/", None));
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    assert!(store.is_blocked("http://stable.test/"));
                    let rules = store.block_rules();
                    assert!(rules.iter().any(|rule| rule.domain == "stable.test"));
                    assert!(rules.len() <= 2);
                    assert!(store.blocked_domains().len() <= 2);
                }
            });
        });

        assert_eq!(store.blocked_domains().len(), 1);
        assert!(store.recent_visits(10).is_empty());
    }
}
