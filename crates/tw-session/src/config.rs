//! Runtime configuration: built-in defaults, a TOML file, the environment,
//! and command-line overrides, applied in that order.

use serde::Deserialize;
use serde::Deserializer;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tw_core::BrowserError;
use tw_core::BrowserResult;
use tw_core::SearchEngine;
use tw_net::FetcherOptions;
use tw_net::Route;
use tw_net::fetch::DEFAULT_MAX_REDIRECTS;
use tw_net::fetch::DEFAULT_USER_AGENT;
use tw_net::tls::TlsPolicy;
use tw_net::tls::TrustStoreMode;

/// Overrides the data directory when set and non-empty.
pub const DATA_DIR_ENV: &str = "TEXTWEB_DATA_DIR";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_DATABASE_FILE: &str = "textweb.db";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LINK_DISPLAY_CAP: usize = 10;
pub const DEFAULT_TEXT_DISPLAY_CAP: usize = 2000;
pub const DEFAULT_PROXY_HOST: &str = "127.0.0.1";
pub const DEFAULT_PROXY_PORT: u16 = 9050;

/// Address of a local SOCKS5 proxy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PROXY_HOST.to_owned(),
            port: DEFAULT_PROXY_PORT,
        }
    }
}

impl ProxyConfig {
    /// First socket address the configured host resolves to.
    pub fn socket_addr(&self) -> BrowserResult<SocketAddr> {
        let mut addresses = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|error| {
                BrowserError::new(
                    "session.config.proxy_unresolvable",
                    format!("cannot resolve proxy {self}: {error}"),
                )
            })?;

        addresses.next().ok_or_else(|| {
            BrowserError::new(
                "session.config.proxy_unresolvable",
                format!("proxy {self} resolved to no addresses"),
            )
        })
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ProxyConfig {
    type Err = BrowserError;

    /// Accepts `host:port`, `[v6]:port`, or a bare host on the default port.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (host, port) = match value.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') || host.starts_with('[') => {
                let port = port.parse::<u16>().ok().filter(|port| *port != 0).ok_or_else(|| {
                    BrowserError::new(
                        "session.config.proxy_invalid",
                        format!("invalid proxy port in `{value}`"),
                    )
                })?;
                (host, port)
            }
            _ => (value, DEFAULT_PROXY_PORT),
        };

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(BrowserError::new(
                "session.config.proxy_invalid",
                format!("missing proxy host in `{value}`"),
            ));
        }

        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
    #[serde(deserialize_with = "deserialize_engine")]
    pub search_engine: SearchEngine,
    /// Present when the proxy should be enabled at startup.
    pub proxy: Option<ProxyConfig>,
    pub incognito: bool,
    /// Trust the operating-system root store in addition to the bundled roots.
    pub trust_os_roots: bool,
    pub link_display_cap: usize,
    pub text_display_cap: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: DEFAULT_DATABASE_FILE.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            search_engine: SearchEngine::default(),
            proxy: None,
            incognito: false,
            trust_os_roots: false,
            link_display_cap: DEFAULT_LINK_DISPLAY_CAP,
            text_display_cap: DEFAULT_TEXT_DISPLAY_CAP,
        }
    }
}

/// Values taken from the command line; `None`/`false` leaves the lower layer alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub incognito: bool,
    pub proxy: Option<ProxyConfig>,
    pub timeout_secs: Option<u64>,
    pub search_engine: Option<SearchEngine>,
}

impl BrowserConfig {
    pub fn load(overrides: &ConfigOverrides) -> BrowserResult<Self> {
        Self::load_with_env(overrides, |key| std::env::var_os(key))
    }

    /// [`BrowserConfig::load`] with an explicit environment source.
    ///
    /// An explicit `config_path` must exist. Otherwise `config.toml` inside the
    /// effective data directory is read if present.
    pub fn load_with_env<E>(overrides: &ConfigOverrides, env: E) -> BrowserResult<Self>
    where
        E: Fn(&str) -> Option<OsString>,
    {
        let env_data_dir = env(DATA_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let mut config = match &overrides.config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let search_dir = overrides
                    .data_dir
                    .clone()
                    .or_else(|| env_data_dir.clone())
                    .unwrap_or_else(default_data_dir);
                let path = search_dir.join(CONFIG_FILE_NAME);
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(data_dir) = env_data_dir {
            config.data_dir = data_dir;
        }
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> BrowserResult<Self> {
        let text = fs::read_to_string(path).map_err(|error| {
            BrowserError::new(
                "session.config.read_failed",
                format!("cannot read {}: {error}", path.display()),
            )
        })?;
        Self::from_toml(&text).map_err(|error| {
            BrowserError::new(
                error.code,
                format!("{}: {}", path.display(), error.message),
            )
        })
    }

    pub fn from_toml(text: &str) -> BrowserResult<Self> {
        toml::from_str(text)
            .map_err(|error| BrowserError::new("session.config.parse_failed", error.to_string()))
    }

    fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(data_dir) = &overrides.data_dir {
            self.data_dir = data_dir.clone();
        }
        if overrides.incognito {
            self.incognito = true;
        }
        if let Some(proxy) = &overrides.proxy {
            self.proxy = Some(proxy.clone());
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(engine) = overrides.search_engine {
            self.search_engine = engine;
        }
    }

    pub fn validate(&self) -> BrowserResult<()> {
        if self.timeout_secs == 0 {
            return Err(BrowserError::new(
                "session.config.invalid_timeout",
                "timeout_secs must be greater than zero",
            ));
        }

        if self.database_file.trim().is_empty() {
            return Err(BrowserError::new(
                "session.config.invalid_database_file",
                "database_file must not be empty",
            ));
        }

        if self.proxy.as_ref().is_some_and(|proxy| proxy.port == 0) {
            return Err(BrowserError::new(
                "session.config.proxy_invalid",
                "proxy port must be greater than zero",
            ));
        }

        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Proxy address used by `proxy on`, whether or not it starts enabled.
    pub fn proxy_address(&self) -> ProxyConfig {
        self.proxy.clone().unwrap_or_default()
    }

    /// Fetcher settings; the route starts direct and is switched by the session.
    pub fn fetcher_options(&self) -> FetcherOptions {
        let trust_store_mode = if self.trust_os_roots {
            TrustStoreMode::WebPkiAndOs
        } else {
            TrustStoreMode::WebPkiOnly
        };

        FetcherOptions {
            user_agent: self.user_agent.clone(),
            max_redirects: self.max_redirects,
            route: Route::Direct,
            tls: TlsPolicy::default().with_trust_store_mode(trust_store_mode),
            resolve_timeout: self.timeout(),
        }
    }
}

/// `<platform data dir>/textweb`, or `./.textweb` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(base) => base.join("textweb"),
        None => PathBuf::from(".textweb"),
    }
}

fn deserialize_engine<'de, D>(deserializer: D) -> Result<SearchEngine, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}
