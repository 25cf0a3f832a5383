//! Session controller, runtime configuration, and text rendering.

pub mod config;
pub mod lookup;
pub mod render;
pub mod session;

use log::error;
use log::info;
use std::sync::Arc;
use tw_core::AddressLookup;
use tw_core::BrowserResult;
use tw_net::HttpFetcher;
use tw_net::SystemDnsResolver;
use tw_storage::BrowserStore;
use tw_storage::IncognitoStore;
use tw_storage::SqliteStore;

pub use config::BrowserConfig;
pub use config::ConfigOverrides;
pub use config::ProxyConfig;
pub use lookup::RoutedLookup;
pub use render::DisplayCaps;
pub use render::PageRenderer;
pub use render::TextPageRenderer;
pub use session::NavigationError;
pub use session::Outcome;
pub use session::ProxyStatus;
pub use session::SEARCH_ENGINE_SETTING;
pub use session::Session;
pub use session::SessionOptions;

/// Store selected by the configuration.
///
/// A durable store that cannot be opened degrades to the in-memory variant so
/// browsing keeps working.
pub fn open_store(config: &BrowserConfig, lookup: Arc<dyn AddressLookup>) -> Arc<dyn BrowserStore> {
    if config.incognito {
        info!("incognito: nothing will be written to disk");
        return Arc::new(IncognitoStore::new());
    }

    let path = config.database_path();
    match SqliteStore::open(&path, lookup) {
        Ok(store) => {
            info!("using store at {}", path.display());
            Arc::new(store)
        }
        Err(error) => {
            error!("{error}; continuing without persistence");
            Arc::new(IncognitoStore::new())
        }
    }
}

/// Network-backed session built from `config`.
pub fn open_session(config: &BrowserConfig) -> BrowserResult<Session<HttpFetcher>> {
    let lookup = Arc::new(RoutedLookup::new(Arc::new(SystemDnsResolver::new(
        config.timeout(),
    ))));
    let store = open_store(config, lookup.clone());
    let options = session_options_for(config, store.as_ref());
    let fetcher = HttpFetcher::new(config.fetcher_options())?;

    Session::new(fetcher, store, lookup, options)
}

/// Options for `config`, with the persisted engine choice taking the place of
/// the configured default.
pub fn session_options_for(config: &BrowserConfig, store: &dyn BrowserStore) -> SessionOptions {
    let mut options = session_options(config);
    options.search_engine = store
        .get_setting(SEARCH_ENGINE_SETTING, config.search_engine.as_str())
        .parse()
        .unwrap_or(config.search_engine);
    options
}

fn session_options(config: &BrowserConfig) -> SessionOptions {
    SessionOptions {
        timeout: config.timeout(),
        search_engine: config.search_engine,
        proxy: config.proxy_address(),
        proxy_enabled: config.proxy.is_some(),
    }
}
