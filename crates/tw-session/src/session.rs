//! One browsing tab: input normalization, firewall check, fetch, extraction,
//! visit auditing, and history, in that order.

use crate::config::ProxyConfig;
use crate::lookup::RoutedLookup;
use core::fmt;
use log::debug;
use log::info;
use log::warn;
use std::sync::Arc;
use std::time::Duration;
use tw_core::BrowserResult;
use tw_core::Location;
use tw_core::SearchEngine;
use tw_core::location::normalize_input;
use tw_core::lookup::display_address;
use tw_history::HistoryError;
use tw_history::NavigationHistory;
use tw_html::Extraction;
use tw_html::Extractor;
use tw_html::LinkTarget;
use tw_html::page::Page;
use tw_net::ContentKind;
use tw_net::FetchError;
use tw_net::PageFetcher;
use tw_net::RedirectGuard;
use tw_net::Route;
use tw_storage::BrowserStore;

/// Visit title recorded for responses that are not HTML.
pub const OPAQUE_TITLE: &str = "Non-HTML content";
/// Settings key holding the user's default search engine.
pub const SEARCH_ENGINE_SETTING: &str = "search_engine";

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Result of one trip through the navigation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    InvalidInput {
        message: String,
    },
    /// Refused by the firewall; nothing was fetched or recorded.
    Blocked {
        location: Location,
    },
    /// Onion address while the proxy is off; nothing was fetched or recorded.
    ProxyRequired {
        location: Location,
    },
    LoadFailed {
        location: Location,
        address: String,
        error: FetchError,
    },
    Loaded {
        location: Location,
        address: String,
        content: Extraction,
        /// Markup could not be read; `content` holds the raw text instead.
        degraded: bool,
    },
    LoadedOpaque {
        location: Location,
        address: String,
        content_type: String,
    },
}

impl Outcome {
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::InvalidInput { .. } => None,
            Self::Blocked { location }
            | Self::ProxyRequired { location }
            | Self::LoadFailed { location, .. }
            | Self::Loaded { location, .. }
            | Self::LoadedOpaque { location, .. } => Some(location),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. } | Self::LoadedOpaque { .. })
    }
}

/// Requests the session refuses before entering the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    InvalidInput { message: String },
    UnknownLink { id: usize, available: usize },
    /// The link exists but points outside http(s).
    UnsupportedLink { id: usize, target: String },
    History(HistoryError),
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { message } => write!(f, "invalid input: {message}"),
            Self::UnknownLink { available: 0, .. } => {
                f.write_str("the current page has no numbered links")
            }
            Self::UnknownLink { id, available } => {
                write!(f, "no link numbered {id} (choose 1-{available})")
            }
            Self::UnsupportedLink { id, target } => {
                write!(f, "link {id} points to {target}, which cannot be opened here")
            }
            Self::History(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for NavigationError {}

impl From<HistoryError> for NavigationError {
    fn from(error: HistoryError) -> Self {
        Self::History(error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    RunningEnabled,
    RunningDisabled,
    NotRunning,
}

impl ProxyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunningEnabled => "Running / Enabled",
            Self::RunningDisabled => "Running / Disabled",
            Self::NotRunning => "Not running",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub timeout: Duration,
    pub search_engine: SearchEngine,
    pub proxy: ProxyConfig,
    pub proxy_enabled: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: tw_net::fetch::DEFAULT_TIMEOUT,
            search_engine: SearchEngine::default(),
            proxy: ProxyConfig::default(),
            proxy_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryUpdate {
    Record,
    Skip,
}

/// Session controller for a single tab.
pub struct Session<F: PageFetcher> {
    fetcher: F,
    store: Arc<dyn BrowserStore>,
    lookup: Arc<RoutedLookup>,
    extractor: Extractor,
    history: NavigationHistory,
    current: Option<Extraction>,
    timeout: Duration,
    search_engine: SearchEngine,
    proxy: ProxyConfig,
    proxy_enabled: bool,
}

impl<F: PageFetcher> fmt::Debug for Session<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("history_len", &self.history.len())
            .field("cursor", &self.history.cursor())
            .field("search_engine", &self.search_engine)
            .field("proxy", &self.proxy)
            .field("proxy_enabled", &self.proxy_enabled)
            .finish_non_exhaustive()
    }
}

impl<F: PageFetcher> Session<F> {
    /// `lookup` should be the same instance the store resolves visit
    /// addresses with, so the proxy switch covers both.
    pub fn new(
        mut fetcher: F,
        store: Arc<dyn BrowserStore>,
        lookup: Arc<RoutedLookup>,
        options: SessionOptions,
    ) -> BrowserResult<Self> {
        let firewall = Arc::clone(&store);
        let guard: RedirectGuard =
            Arc::new(move |next: &Location| !firewall.is_blocked(next.as_str()));
        fetcher.set_redirect_guard(guard);

        let mut session = Self {
            fetcher,
            store,
            lookup,
            extractor: Extractor::default(),
            history: NavigationHistory::new(),
            current: None,
            timeout: options.timeout,
            search_engine: options.search_engine,
            proxy: options.proxy,
            proxy_enabled: false,
        };

        if options.proxy_enabled {
            session.set_proxy(true)?;
        }
        Ok(session)
    }

    /// Normalizes `input` and runs the full pipeline.
    pub fn open(&mut self, input: &str) -> Outcome {
        match self.resolve_input(input) {
            Ok(location) => self.navigate(location, HistoryUpdate::Record),
            Err(error) => Outcome::InvalidInput {
                message: error.to_string(),
            },
        }
    }

    pub fn resolve_input(&self, input: &str) -> Result<Location, NavigationError> {
        let location = normalize_input(input, self.effective_search_engine()).map_err(|error| {
            NavigationError::InvalidInput {
                message: error.message,
            }
        })?;
        debug!("normalized `{}` to {location}", input.trim());
        Ok(location)
    }

    /// Follows link `id` of the current page, or result `id` of the current
    /// result list.
    pub fn follow_link(&mut self, id: usize) -> Result<Outcome, NavigationError> {
        let target = self.link_target(id)?;
        Ok(self.navigate(target, HistoryUpdate::Record))
    }

    pub fn link_target(&self, id: usize) -> Result<Location, NavigationError> {
        let (target, available) = match &self.current {
            Some(Extraction::Page(page)) => {
                let target = match page.link(id).map(|link| &link.target) {
                    Some(LinkTarget::Web(location)) => Some(location.clone()),
                    Some(LinkTarget::Other(raw)) => {
                        return Err(NavigationError::UnsupportedLink {
                            id,
                            target: raw.clone(),
                        });
                    }
                    None => None,
                };
                (target, page.link_count())
            }
            Some(Extraction::SearchResults(results)) => (
                results.result(id).map(|result| result.url.clone()),
                results.results.len(),
            ),
            None => (None, 0),
        };

        target.ok_or(NavigationError::UnknownLink { id, available })
    }

    /// Moves the cursor back, then re-fetches that entry.
    pub fn back(&mut self) -> Result<Outcome, NavigationError> {
        let target = self.history.back()?.clone();
        Ok(self.navigate(target, HistoryUpdate::Skip))
    }

    /// Moves the cursor forward, then re-fetches that entry.
    pub fn forward(&mut self) -> Result<Outcome, NavigationError> {
        let target = self.history.forward()?.clone();
        Ok(self.navigate(target, HistoryUpdate::Skip))
    }

    pub fn reload(&mut self) -> Result<Outcome, NavigationError> {
        let target = self.history.current()?.clone();
        Ok(self.navigate(target, HistoryUpdate::Skip))
    }

    fn navigate(&mut self, location: Location, update: HistoryUpdate) -> Outcome {
        if self.store.is_blocked(location.as_str()) {
            info!("firewall refused {location}");
            return Outcome::Blocked { location };
        }

        if location.is_onion() && !self.proxy_enabled {
            debug!("refusing onion address {location} while the proxy is off");
            return Outcome::ProxyRequired { location };
        }

        let address = display_address(&*self.lookup, location.domain());
        debug!("fetching {location} (address {address})");

        let result = match self.fetcher.fetch(&location, self.timeout) {
            Ok(result) => result,
            Err(FetchError::RedirectRefused { location: refused }) => {
                info!("firewall refused redirect from {location} to {refused}");
                return Outcome::Blocked { location: refused };
            }
            Err(error) => {
                warn!("loading {location} failed: {error}");
                let title = format!("Error: {}", error.summary());
                self.store.record_visit(location.as_str(), Some(title.as_str()));
                return Outcome::LoadFailed {
                    location,
                    address,
                    error,
                };
            }
        };

        let final_location = result.final_location.clone();
        if result.was_redirected() && self.store.is_blocked(final_location.as_str()) {
            info!("firewall refused redirect from {location} to {final_location}");
            return Outcome::Blocked {
                location: final_location,
            };
        }

        match result.content_kind() {
            ContentKind::Opaque => {
                self.store
                    .record_visit(final_location.as_str(), Some(OPAQUE_TITLE));
                self.commit(update, &final_location);
                self.current = None;
                Outcome::LoadedOpaque {
                    location: final_location,
                    address,
                    content_type: result.content_type,
                }
            }
            ContentKind::Html => {
                let text = result.text();
                let (content, degraded) = match self.extractor.extract(&text, &final_location) {
                    Ok(content) => (content, false),
                    Err(error) => {
                        warn!("showing raw text for {final_location}: {error}");
                        (Extraction::Page(Page::from_raw_text(&text)), true)
                    }
                };

                let title = content
                    .title()
                    .filter(|title| !title.trim().is_empty())
                    .unwrap_or(final_location.domain())
                    .to_owned();
                self.store
                    .record_visit(final_location.as_str(), Some(title.as_str()));
                self.commit(update, &final_location);
                self.current = Some(content.clone());
                Outcome::Loaded {
                    location: final_location,
                    address,
                    content,
                    degraded,
                }
            }
        }
    }

    fn commit(&mut self, update: HistoryUpdate, location: &Location) {
        if update == HistoryUpdate::Record {
            self.history.visit(location.clone());
        }
    }

    /// Switches the transport between direct connections and the SOCKS5 proxy.
    pub fn set_proxy(&mut self, enabled: bool) -> BrowserResult<()> {
        let route = if enabled {
            Route::Socks5(self.proxy.socket_addr()?)
        } else {
            Route::Direct
        };

        self.fetcher.set_route(route);
        self.lookup.set_suppressed(enabled);
        self.proxy_enabled = enabled;
        info!(
            "proxy {} ({})",
            if enabled { "enabled" } else { "disabled" },
            self.proxy
        );
        Ok(())
    }

    /// Probes the proxy port with a short TCP connect.
    pub fn proxy_status(&self) -> ProxyStatus {
        let running = self
            .proxy
            .socket_addr()
            .map(|address| tw_net::probe(address, PROBE_TIMEOUT))
            .unwrap_or(false);

        match (running, self.proxy_enabled) {
            (true, true) => ProxyStatus::RunningEnabled,
            (true, false) => ProxyStatus::RunningDisabled,
            (false, _) => ProxyStatus::NotRunning,
        }
    }

    pub fn proxy_enabled(&self) -> bool {
        self.proxy_enabled
    }

    pub fn proxy(&self) -> &ProxyConfig {
        &self.proxy
    }

    /// Changes the default engine and persists the choice.
    pub fn set_search_engine(&mut self, engine: SearchEngine) {
        self.search_engine = engine;
        if !self.store.save_setting(SEARCH_ENGINE_SETTING, engine.as_str()) {
            warn!("search engine choice was not persisted");
        }
    }

    pub fn search_engine(&self) -> SearchEngine {
        self.search_engine
    }

    /// Engine that free text is rewritten into right now.
    pub fn effective_search_engine(&self) -> SearchEngine {
        if self.proxy_enabled {
            SearchEngine::DuckDuckGo
        } else {
            self.search_engine
        }
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn current_location(&self) -> Option<&Location> {
        self.history.current().ok()
    }

    pub fn current_content(&self) -> Option<&Extraction> {
        self.current.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn BrowserStore> {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::NavigationError;
    use super::OPAQUE_TITLE;
    use super::Outcome;
    use super::SEARCH_ENGINE_SETTING;
    use super::Session;
    use super::SessionOptions;
    use crate::lookup::RoutedLookup;
    use std::collections::HashMap;
    use std::net::IpAddr;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;
    use tw_core::AddressLookup;
    use tw_core::Location;
    use tw_core::SearchEngine;
    use tw_core::lookup::HIDDEN_ADDRESS;
    use tw_history::HistoryError;
    use tw_html::Extraction;
    use tw_net::FetchError;
    use tw_net::FetchResult;
    use tw_net::PageFetcher;
    use tw_net::RedirectGuard;
    use tw_net::Route;
    use tw_storage::BrowserStore;
    use tw_storage::IncognitoStore;
    use tw_storage::SqliteStore;

    pub(crate) const SERVER_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);

    pub(crate) struct FixedLookup;

    impl AddressLookup for FixedLookup {
        fn lookup(&self, _host: &str) -> Option<IpAddr> {
            Some(IpAddr::V4(SERVER_ADDRESS))
        }
    }

    /// Serves canned responses keyed by URL and remembers every request.
    #[derive(Default)]
    pub(crate) struct ScriptedFetcher {
        responses: HashMap<String, Result<(String, Vec<u8>), FetchError>>,
        redirects: HashMap<String, String>,
        guard: Option<RedirectGuard>,
        ignore_guard: bool,
        pub(crate) requests: Vec<String>,
        pub(crate) routes: Vec<Route>,
    }

    impl ScriptedFetcher {
        pub(crate) fn page(mut self, url: &str, content_type: &str, body: &str) -> Self {
            self.responses.insert(
                url.to_owned(),
                Ok((content_type.to_owned(), body.as_bytes().to_vec())),
            );
            self
        }

        pub(crate) fn failure(mut self, url: &str, error: FetchError) -> Self {
            self.responses.insert(url.to_owned(), Err(error));
            self
        }

        pub(crate) fn redirect(mut self, from: &str, to: &str) -> Self {
            self.redirects.insert(from.to_owned(), to.to_owned());
            self
        }

        /// Follows redirects without consulting the installed guard.
        pub(crate) fn ignoring_guard(mut self) -> Self {
            self.ignore_guard = true;
            self
        }
    }

    impl PageFetcher for ScriptedFetcher {
        fn fetch(
            &mut self,
            location: &Location,
            _timeout: Duration,
        ) -> Result<FetchResult, FetchError> {
            self.requests.push(location.as_str().to_owned());

            let final_url = self
                .redirects
                .get(location.as_str())
                .cloned()
                .unwrap_or_else(|| location.as_str().to_owned());
            let final_location = match Location::parse(&final_url) {
                Ok(value) => value,
                Err(error) => panic!("{error}"),
            };
            if let Some(guard) = self.guard.as_ref().filter(|_| !self.ignore_guard) {
                if final_location != *location && !guard(&final_location) {
                    return Err(FetchError::RedirectRefused {
                        location: final_location,
                    });
                }
            }

            let response = self.responses.get(&final_url).cloned().unwrap_or_else(|| {
                Err(FetchError::DnsResolutionFailed {
                    message: format!("no script for {final_url}"),
                })
            });
            let (content_type, body) = response?;

            Ok(FetchResult {
                requested_location: location.clone(),
                final_location,
                status_code: 200,
                content_type,
                headers: Vec::new(),
                body,
            })
        }

        fn set_route(&mut self, route: Route) {
            self.routes.push(route);
        }

        fn set_redirect_guard(&mut self, guard: RedirectGuard) {
            self.guard = Some(guard);
        }
    }

    fn lookup() -> Arc<RoutedLookup> {
        Arc::new(RoutedLookup::new(Arc::new(FixedLookup)))
    }

    fn durable_session(fetcher: ScriptedFetcher) -> Session<ScriptedFetcher> {
        let lookup = lookup();
        let store = SqliteStore::open_in_memory(lookup.clone());
        assert!(store.is_ok());
        let store = match store {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let session = Session::new(fetcher, Arc::new(store), lookup, SessionOptions::default());
        match session {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn location(url: &str) -> Location {
        match Location::parse(url) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn navigated(result: Result<Outcome, NavigationError>) -> Outcome {
        match result {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    const ARTICLE: &str = "<html><head><title>OpenAI</title></head><body>\
        <p>Research and deployment.</p>\
        <a href=\"/research\">Research</a> <a href=\"https://example.org/\">Elsewhere</a>\
        </body></html>";

    #[test]
    fn bare_domain_loads_into_history_and_visit_log() {
        let fetcher = ScriptedFetcher::default().page("http://openai.com/", "text/html", ARTICLE);
        let mut session = durable_session(fetcher);

        let outcome = session.open("openai.com");
        let Outcome::Loaded {
            location,
            address,
            content,
            degraded,
        } = &outcome
        else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(location.as_str(), "http://openai.com/");
        assert_eq!(*address, SERVER_ADDRESS.to_string());
        assert_eq!(content.title(), Some("OpenAI"));
        assert!(!*degraded);

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().cursor(), Some(0));

        let visits = session.store().recent_visits(10);
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].title.as_deref(), Some("OpenAI"));
        assert_eq!(visits[0].ip_address, SERVER_ADDRESS.to_string());
    }

    #[test]
    fn blocked_subdomain_touches_nothing() {
        let fetcher =
            ScriptedFetcher::default().page("http://sub.example.com/x", "text/html", ARTICLE);
        let mut session = durable_session(fetcher);
        assert!(session.store().block("example.com", None));

        let outcome = session.open("http://sub.example.com/x");
        assert!(matches!(outcome, Outcome::Blocked { .. }));
        assert!(session.fetcher().requests.is_empty());
        assert!(session.history().is_empty());
        assert!(session.store().recent_visits(10).is_empty());
    }

    #[test]
    fn opaque_content_is_recorded_with_placeholder() {
        let fetcher = ScriptedFetcher::default().page(
            "https://example.com/paper.pdf",
            "application/pdf",
            "%PDF-1.7",
        );
        let mut session = durable_session(fetcher);

        let outcome = session.open("https://example.com/paper.pdf");
        let Outcome::LoadedOpaque { content_type, .. } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(content_type, "application/pdf");
        assert!(session.current_content().is_none());
        assert_eq!(session.history().len(), 1);

        let visits = session.store().recent_visits(10);
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].title.as_deref(), Some(OPAQUE_TITLE));
    }

    #[test]
    fn failed_fetch_is_audited_but_not_remembered() {
        let fetcher = ScriptedFetcher::default().failure(
            "https://example.com/missing",
            FetchError::HttpStatus {
                code: 404,
                reason: "Not Found".to_owned(),
            },
        );
        let mut session = durable_session(fetcher);

        let outcome = session.open("https://example.com/missing");
        assert!(matches!(
            outcome,
            Outcome::LoadFailed {
                error: FetchError::HttpStatus { code: 404, .. },
                ..
            }
        ));
        assert!(session.history().is_empty());

        let visits = session.store().recent_visits(10);
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].url, "https://example.com/missing");
        assert_eq!(visits[0].title.as_deref(), Some("Error: 404 Not Found"));
    }

    #[test]
    fn redirects_record_the_final_location() {
        let fetcher = ScriptedFetcher::default()
            .redirect("http://example.com/", "https://www.example.com/")
            .page("https://www.example.com/", "text/html; charset=utf-8", ARTICLE);
        let mut session = durable_session(fetcher);

        let outcome = session.open("example.com");
        assert!(outcome.is_loaded());
        assert_eq!(
            session.current_location().map(Location::as_str),
            Some("https://www.example.com/")
        );
        let visits = session.store().recent_visits(1);
        assert_eq!(visits[0].url, "https://www.example.com/");
    }

    #[test]
    fn redirect_into_blocked_domain_is_refused() {
        let fetcher = ScriptedFetcher::default()
            .redirect("http://allowed.com/", "http://tracker.blocked.com/")
            .page("http://tracker.blocked.com/", "text/html", ARTICLE);
        let mut session = durable_session(fetcher);
        assert!(session.store().block("blocked.com", None));

        let outcome = session.open("allowed.com");
        let Outcome::Blocked { location } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(location.as_str(), "http://tracker.blocked.com/");
        assert!(session.history().is_empty());
        assert!(session.current_content().is_none());
        assert!(session.store().recent_visits(10).is_empty());
    }

    #[test]
    fn blocked_final_location_is_caught_after_the_fetch() {
        let fetcher = ScriptedFetcher::default()
            .redirect("http://allowed.com/", "http://tracker.blocked.com/")
            .page("http://tracker.blocked.com/", "text/html", ARTICLE)
            .ignoring_guard();
        let mut session = durable_session(fetcher);
        assert!(session.store().block("blocked.com", None));

        let outcome = session.open("allowed.com");
        assert!(matches!(outcome, Outcome::Blocked { .. }));
        assert!(!outcome.is_loaded());
        assert!(session.history().is_empty());
        assert!(session.store().recent_visits(10).is_empty());
    }

    #[test]
    fn non_web_links_are_numbered_but_not_followed() {
        let fetcher = ScriptedFetcher::default().page(
            "http://openai.com/",
            "text/html",
            "<title>Contact</title><a href='mailto:hi@openai.com'>Mail us</a><a href='/about'>About</a>",
        );
        let mut session = durable_session(fetcher);
        assert!(session.open("openai.com").is_loaded());

        let result = session.follow_link(1);
        assert_eq!(
            result,
            Err(NavigationError::UnsupportedLink {
                id: 1,
                target: "mailto:hi@openai.com".to_owned(),
            })
        );
        assert_eq!(session.fetcher().requests.len(), 1);
        assert_eq!(
            session.link_target(2).map(|target| target.as_str().to_owned()),
            Ok("http://openai.com/about".to_owned())
        );
    }

    #[test]
    fn numbered_links_are_followed() {
        let fetcher = ScriptedFetcher::default()
            .page("http://openai.com/", "text/html", ARTICLE)
            .page(
                "http://openai.com/research",
                "text/html",
                "<title>Research</title><p>Papers</p>",
            );
        let mut session = durable_session(fetcher);
        assert!(session.open("openai.com").is_loaded());

        let followed = navigated(session.follow_link(1));
        assert_eq!(
            followed.location().map(Location::as_str),
            Some("http://openai.com/research")
        );
        assert_eq!(session.history().len(), 2);

        let missing = session.follow_link(9);
        assert!(matches!(
            missing,
            Err(NavigationError::UnknownLink { id: 9, .. })
        ));
    }

    #[test]
    fn back_and_forward_refetch_without_growing_history() {
        let fetcher = ScriptedFetcher::default()
            .page("http://a.test/", "text/html", "<title>A</title>")
            .page("http://b.test/", "text/html", "<title>B</title>");
        let mut session = durable_session(fetcher);
        assert!(session.open("a.test").is_loaded());
        assert!(session.open("b.test").is_loaded());

        let back = navigated(session.back());
        assert_eq!(back.location().map(Location::as_str), Some("http://a.test/"));
        assert_eq!(session.history().cursor(), Some(0));
        assert_eq!(session.history().len(), 2);

        let forward = navigated(session.forward());
        assert_eq!(forward.location().map(Location::as_str), Some("http://b.test/"));
        assert_eq!(session.history().cursor(), Some(1));

        assert_eq!(
            session.fetcher().requests,
            vec![
                "http://a.test/".to_owned(),
                "http://b.test/".to_owned(),
                "http://a.test/".to_owned(),
                "http://b.test/".to_owned(),
            ]
        );
        assert_eq!(session.store().recent_visits(10).len(), 4);
    }

    #[test]
    fn history_edges_are_reported() {
        let fetcher = ScriptedFetcher::default().page("http://a.test/", "text/html", "<p>a</p>");
        let mut session = durable_session(fetcher);

        assert_eq!(
            session.reload(),
            Err(NavigationError::History(HistoryError::Empty))
        );

        assert!(session.open("a.test").is_loaded());
        assert_eq!(
            session.back(),
            Err(NavigationError::History(HistoryError::NoPreviousEntry))
        );
        assert_eq!(
            session.forward(),
            Err(NavigationError::History(HistoryError::NoNextEntry))
        );

        let reloaded = navigated(session.reload());
        assert!(reloaded.is_loaded());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut session = durable_session(ScriptedFetcher::default());
        let outcome = session.open("   ");
        assert!(matches!(outcome, Outcome::InvalidInput { .. }));
        assert!(session.fetcher().requests.is_empty());
    }

    #[test]
    fn unreadable_markup_degrades_to_raw_text() {
        let garbage = "\u{1}\u{2}\u{3}\u{4}\u{5}\u{6}\u{7}\u{8}ok";
        let fetcher = ScriptedFetcher::default().page("http://bin.test/", "text/html", garbage);
        let mut session = durable_session(fetcher);

        let outcome = session.open("bin.test");
        let Outcome::Loaded {
            content, degraded, ..
        } = &outcome
        else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(*degraded);
        assert!(matches!(content, Extraction::Page(_)));

        let visits = session.store().recent_visits(1);
        assert_eq!(visits[0].title.as_deref(), Some("bin.test"));
    }

    #[test]
    fn onion_addresses_need_the_proxy() {
        let onion = "http://exampleonionaddress.onion/";
        let fetcher = ScriptedFetcher::default().page(onion, "text/html", "<title>Hidden</title>");
        let mut session = durable_session(fetcher);

        let refused = session.open(onion);
        assert!(matches!(refused, Outcome::ProxyRequired { .. }));
        assert!(session.fetcher().requests.is_empty());
        assert!(session.store().recent_visits(10).is_empty());

        assert!(session.set_proxy(true).is_ok());
        assert!(matches!(
            session.fetcher().routes.last(),
            Some(Route::Socks5(_))
        ));

        let loaded = session.open(onion);
        let Outcome::Loaded { address, .. } = &loaded else {
            panic!("unexpected outcome {loaded:?}");
        };
        assert_eq!(address, HIDDEN_ADDRESS);
        assert_eq!(session.store().recent_visits(1)[0].ip_address, HIDDEN_ADDRESS);

        assert!(session.set_proxy(false).is_ok());
        assert_eq!(session.fetcher().routes.last(), Some(&Route::Direct));
    }

    #[test]
    fn proxy_forces_duckduckgo_for_free_text() {
        let mut session = durable_session(ScriptedFetcher::default());
        assert_eq!(session.effective_search_engine(), SearchEngine::Google);

        assert!(session.set_proxy(true).is_ok());
        let resolved = session.resolve_input("rust borrow checker");
        assert!(resolved.is_ok());

        let resolved = match resolved {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(resolved.domain(), "duckduckgo.com");
        assert_eq!(session.search_engine(), SearchEngine::Google);
    }

    #[test]
    fn engine_choice_is_persisted() {
        let mut session = durable_session(ScriptedFetcher::default());
        session.set_search_engine(SearchEngine::DuckDuckGo);
        assert_eq!(
            session.store().get_setting(SEARCH_ENGINE_SETTING, "google"),
            "duckduckgo"
        );
    }

    #[test]
    fn search_results_are_followed_by_rank() {
        let results = "<html><head><title>rust - DuckDuckGo</title></head><body>\
            <div class=\"result results_links\"><h2><a class=\"result__a\" href=\"https://www.rust-lang.org/\">Rust</a></h2>\
            <a class=\"result__snippet\">A language empowering everyone.</a></div>\
            </body></html>";
        let query = "https://duckduckgo.com/html/?q=rust";
        let fetcher = ScriptedFetcher::default()
            .page(query, "text/html", results)
            .page("https://www.rust-lang.org/", "text/html", "<title>Rust</title>");
        let mut session = durable_session(fetcher);
        session.set_search_engine(SearchEngine::DuckDuckGo);

        let outcome = session.open("rust");
        let Outcome::Loaded { content, .. } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        let Extraction::SearchResults(found) = content else {
            panic!("expected search results, got {content:?}");
        };
        assert_eq!(found.results.len(), 1);

        let followed = navigated(session.follow_link(1));
        assert_eq!(
            followed.location().map(Location::as_str),
            Some("https://www.rust-lang.org/")
        );
    }

    #[test]
    fn incognito_session_leaves_no_visits() {
        let fetcher = ScriptedFetcher::default().page("http://openai.com/", "text/html", ARTICLE);
        let store: Arc<dyn BrowserStore> = Arc::new(IncognitoStore::new());
        let session = Session::new(fetcher, store, lookup(), SessionOptions::default());
        let mut session = match session {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert!(session.open("openai.com").is_loaded());
        assert_eq!(session.history().len(), 1);
        assert!(session.store().recent_visits(10).is_empty());
    }
}
