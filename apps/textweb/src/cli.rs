use clap::Parser;
use std::path::PathBuf;
use tw_core::SearchEngine;
use tw_session::ConfigOverrides;
use tw_session::ProxyConfig;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "textweb",
    version,
    about = "Text-mode web client with visit tracking and a domain firewall"
)]
pub(crate) struct Cli {
    /// Page or search to open at startup.
    #[arg(value_name = "URL")]
    pub(crate) url: Option<String>,

    /// Configuration file (default: <data dir>/config.toml).
    #[arg(long, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,

    /// Directory holding the database and configuration.
    #[arg(long, value_name = "DIR")]
    pub(crate) data_dir: Option<PathBuf>,

    /// Keep history, visits and settings in memory only.
    #[arg(long, default_value_t = false)]
    pub(crate) incognito: bool,

    /// Start with traffic routed through this SOCKS5 proxy.
    #[arg(long, value_name = "HOST:PORT")]
    pub(crate) proxy: Option<ProxyConfig>,

    /// Request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub(crate) timeout: Option<u64>,

    /// Default search engine (google or duckduckgo).
    #[arg(long, value_name = "NAME")]
    pub(crate) engine: Option<SearchEngine>,

    /// Log pipeline steps to stderr.
    #[arg(short, long, default_value_t = false)]
    pub(crate) verbose: bool,
}

impl Cli {
    pub(crate) fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            data_dir: self.data_dir.clone(),
            incognito: self.incognito,
            proxy: self.proxy.clone(),
            timeout_secs: self.timeout,
            search_engine: self.engine,
        }
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug and the default is warn.
pub(crate) fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}
