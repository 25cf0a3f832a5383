use crate::BlockRule;
use crate::Bookmark;
use crate::BookmarkStore;
use crate::DEFAULT_BLOCK_REASON;
use crate::FirewallStore;
use crate::PersistenceError;
use crate::SettingsStore;
use crate::UNKNOWN_LOCATION;
use crate::VisitRecord;
use crate::VisitStore;
use crate::recordable_host;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use log::debug;
use log::error;
use log::info;
use log::warn;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::RwLock;
use tw_core::AddressLookup;
use tw_core::firewall;
use tw_core::lookup::display_address;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS visits (
        id INTEGER PRIMARY KEY,
        url TEXT NOT NULL,
        title TEXT,
        ip_address TEXT,
        location TEXT,
        visit_time TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_visits_time ON visits(visit_time DESC);

    CREATE TABLE IF NOT EXISTS firewall (
        id INTEGER PRIMARY KEY,
        domain TEXT UNIQUE NOT NULL,
        reason TEXT,
        blocked_time TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS bookmarks (
        id INTEGER PRIMARY KEY,
        url TEXT UNIQUE NOT NULL,
        title TEXT,
        added_time TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS settings (
        id INTEGER PRIMARY KEY,
        key TEXT UNIQUE NOT NULL,
        value TEXT
    );
";

/// Durable store on a single SQLite connection.
///
/// The blocked-domain set is cached in memory and replaced while the
/// connection lock is still held, so once `block`/`unblock` return, readers
/// see the same rules the database holds.
pub struct SqliteStore {
    path: Option<PathBuf>,
    connection: Mutex<Connection>,
    blocked: RwLock<BTreeSet<String>>,
    lookup: Arc<dyn AddressLookup>,
}

impl core::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("blocked", &self.blocked_domains().len())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens or creates the database at `path`, creating parent directories.
    pub fn open(path: &Path, lookup: Arc<dyn AddressLookup>) -> Result<Self, PersistenceError> {
        let open_error = |message: String| PersistenceError::Open {
            path: path.to_path_buf(),
            message,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| open_error(error.to_string()))?;
        }

        let connection = Connection::open(path).map_err(|error| open_error(error.to_string()))?;
        connection
            .execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|error| open_error(error.to_string()))?;
        info!("opened store at {}", path.display());
        Self::initialize(Some(path.to_path_buf()), connection, lookup)
    }

    /// Private database that vanishes with the process.
    pub fn open_in_memory(lookup: Arc<dyn AddressLookup>) -> Result<Self, PersistenceError> {
        let connection = Connection::open_in_memory().map_err(|error| PersistenceError::Open {
            path: PathBuf::from(":memory:"),
            message: error.to_string(),
        })?;
        Self::initialize(None, connection, lookup)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize(
        path: Option<PathBuf>,
        connection: Connection,
        lookup: Arc<dyn AddressLookup>,
    ) -> Result<Self, PersistenceError> {
        connection
            .execute_batch(SCHEMA)
            .map_err(|error| PersistenceError::query("create schema", &error))?;
        let blocked = load_blocked(&connection)?;

        Ok(Self {
            path,
            connection: Mutex::new(connection),
            blocked: RwLock::new(blocked),
            lookup,
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs a rule mutation and reloads the cache under the same lock.
    fn mutate_rules(
        &self,
        operation: &'static str,
        mutation: impl FnOnce(&Connection) -> rusqlite::Result<usize>,
    ) -> Result<usize, PersistenceError> {
        let connection = self.connection();
        let changed =
            mutation(&connection).map_err(|error| PersistenceError::query(operation, &error))?;
        let fresh = load_blocked(&connection)?;
        *self.blocked.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(changed)
    }

    fn try_record_visit(&self, url: &str, title: Option<&str>) -> Result<bool, PersistenceError> {
        let Some(host) = recordable_host(url) else {
            debug!("not recording visit to `{url}`");
            return Ok(false);
        };

        // Resolved before taking the lock; lookups can be slow.
        let ip_address = display_address(self.lookup.as_ref(), &host);
        self.connection()
            .execute(
                "INSERT INTO visits (url, title, ip_address, location, visit_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![url, title, ip_address, UNKNOWN_LOCATION, timestamp(Utc::now())],
            )
            .map_err(|error| PersistenceError::query("record visit", &error))?;
        Ok(true)
    }

    fn try_recent_visits(&self, limit: usize) -> Result<Vec<VisitRecord>, PersistenceError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let connection = self.connection();
        let mut statement = connection
            .prepare(
                "SELECT url, title, ip_address, location, visit_time FROM visits
                 ORDER BY visit_time DESC, id DESC LIMIT ?1",
            )
            .map_err(|error| PersistenceError::query("list visits", &error))?;
        let rows = statement
            .query_map(params![limit], |row| {
                Ok(VisitRecord {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    ip_address: row
                        .get::<_, Option<String>>(2)?
                        .unwrap_or_else(|| tw_core::lookup::UNKNOWN_ADDRESS.to_owned()),
                    location: row
                        .get::<_, Option<String>>(3)?
                        .unwrap_or_else(|| UNKNOWN_LOCATION.to_owned()),
                    visited_at: parse_timestamp(&row.get::<_, String>(4)?),
                })
            })
            .map_err(|error| PersistenceError::query("list visits", &error))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|error| PersistenceError::query("list visits", &error))
    }

    fn try_block_rules(&self) -> Result<Vec<BlockRule>, PersistenceError> {
        let connection = self.connection();
        let mut statement = connection
            .prepare("SELECT domain, reason, blocked_time FROM firewall ORDER BY domain")
            .map_err(|error| PersistenceError::query("list block rules", &error))?;
        let rows = statement
            .query_map([], |row| {
                Ok(BlockRule {
                    domain: row.get(0)?,
                    reason: row.get(1)?,
                    created_at: parse_timestamp(&row.get::<_, String>(2)?),
                })
            })
            .map_err(|error| PersistenceError::query("list block rules", &error))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|error| PersistenceError::query("list block rules", &error))
    }

    fn try_get_setting(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.connection()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(|error| PersistenceError::query("read setting", &error))
    }

    fn try_bookmarks(&self) -> Result<Vec<Bookmark>, PersistenceError> {
        let connection = self.connection();
        let mut statement = connection
            .prepare("SELECT url, title, added_time FROM bookmarks ORDER BY title, url")
            .map_err(|error| PersistenceError::query("list bookmarks", &error))?;
        let rows = statement
            .query_map([], |row| {
                Ok(Bookmark {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    added_at: parse_timestamp(&row.get::<_, String>(2)?),
                })
            })
            .map_err(|error| PersistenceError::query("list bookmarks", &error))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|error| PersistenceError::query("list bookmarks", &error))
    }
}

impl VisitStore for SqliteStore {
    fn record_visit(&self, url: &str, title: Option<&str>) -> bool {
        match self.try_record_visit(url, title) {
            Ok(_) => true,
            Err(error) => {
                warn!("{error}");
                false
            }
        }
    }

    fn recent_visits(&self, limit: usize) -> Vec<VisitRecord> {
        self.try_recent_visits(limit).unwrap_or_else(|error| {
            warn!("{error}");
            Vec::new()
        })
    }
}

impl FirewallStore for SqliteStore {
    fn is_blocked(&self, url: &str) -> bool {
        let blocked = self.blocked.read().unwrap_or_else(PoisonError::into_inner);
        firewall::is_blocked(url, &blocked)
    }

    fn block(&self, domain: &str, reason: Option<&str>) -> bool {
        let Some(domain) = firewall::canonical_domain(domain) else {
            warn!("refusing to block `{domain}`: no host");
            return false;
        };
        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(DEFAULT_BLOCK_REASON);

        let result = self.mutate_rules("block domain", |connection| {
            connection.execute(
                "INSERT INTO firewall (domain, reason, blocked_time) VALUES (?1, ?2, ?3)
                 ON CONFLICT(domain) DO UPDATE SET
                     reason = excluded.reason,
                     blocked_time = excluded.blocked_time",
                params![domain, reason, timestamp(Utc::now())],
            )
        });
        match result {
            Ok(_) => {
                info!("blocked {domain} ({reason})");
                true
            }
            Err(error) => {
                error!("{error}");
                false
            }
        }
    }

    fn unblock(&self, domain: &str) -> bool {
        let Some(domain) = firewall::canonical_domain(domain) else {
            return false;
        };

        let result = self.mutate_rules("unblock domain", |connection| {
            connection.execute("DELETE FROM firewall WHERE domain = ?1", params![domain])
        });
        match result {
            Ok(removed) => {
                if removed > 0 {
                    info!("unblocked {domain}");
                }
                removed > 0
            }
            Err(error) => {
                error!("{error}");
                false
            }
        }
    }

    fn blocked_domains(&self) -> BTreeSet<String> {
        self.blocked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn block_rules(&self) -> Vec<BlockRule> {
        self.try_block_rules().unwrap_or_else(|error| {
            warn!("{error}");
            Vec::new()
        })
    }
}

impl SettingsStore for SqliteStore {
    fn get_setting(&self, key: &str, default: &str) -> String {
        match self.try_get_setting(key) {
            Ok(Some(value)) => value,
            Ok(None) => default.to_owned(),
            Err(error) => {
                warn!("{error}");
                default.to_owned()
            }
        }
    }

    fn save_setting(&self, key: &str, value: &str) -> bool {
        let saved = self.connection().execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        );
        match saved {
            Ok(_) => true,
            Err(error) => {
                warn!("{}", PersistenceError::query("save setting", &error));
                false
            }
        }
    }
}

impl BookmarkStore for SqliteStore {
    fn add_bookmark(&self, url: &str, title: Option<&str>) -> bool {
        let added = self.connection().execute(
            "INSERT INTO bookmarks (url, title, added_time) VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET title = excluded.title",
            params![url, title, timestamp(Utc::now())],
        );
        match added {
            Ok(_) => {
                info!("bookmarked {url}");
                true
            }
            Err(error) => {
                error!("{}", PersistenceError::query("add bookmark", &error));
                false
            }
        }
    }

    fn remove_bookmark(&self, url: &str) -> bool {
        let removed = self
            .connection()
            .execute("DELETE FROM bookmarks WHERE url = ?1", params![url]);
        match removed {
            Ok(count) => count > 0,
            Err(error) => {
                error!("{}", PersistenceError::query("remove bookmark", &error));
                false
            }
        }
    }

    fn bookmarks(&self) -> Vec<Bookmark> {
        self.try_bookmarks().unwrap_or_else(|error| {
            warn!("{error}");
            Vec::new()
        })
    }
}

fn load_blocked(connection: &Connection) -> Result<BTreeSet<String>, PersistenceError> {
    let mut statement = connection
        .prepare("SELECT domain FROM firewall")
        .map_err(|error| PersistenceError::query("load blocked domains", &error))?;
    let domains = statement
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|error| PersistenceError::query("load blocked domains", &error))?;
    domains
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .map_err(|error| PersistenceError::query("load blocked domains", &error))
}

/// Fixed-width UTC text so lexical order is chronological order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or_default()
}
