//! Page fetching: GET with browser headers, redirect following and a typed
//! failure taxonomy.

use crate::charset::decode_text;
use crate::client::HttpClient;
use crate::dns::SystemDnsResolver;
use crate::http::Header;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::http::find_header;
use crate::tls::TlsPolicy;
use crate::tls_backend::RustlsConnector;
use crate::transport::Route;
use crate::transport::RoutedTransport;
use core::fmt;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tw_core::BrowserError;
use tw_core::BrowserResult;
use tw_core::Location;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// What a caller may do with a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    /// Anything else; never handed to the extractor.
    Opaque,
}

impl ContentKind {
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence.starts_with("text/html") || essence == "application/xhtml+xml" {
            Self::Html
        } else {
            Self::Opaque
        }
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub requested_location: Location,
    /// Where the redirect chain ended.
    pub final_location: Location,
    pub status_code: u16,
    /// `unknown` when the server sent no Content-Type.
    pub content_type: String,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl FetchResult {
    pub fn content_kind(&self) -> ContentKind {
        ContentKind::from_content_type(&self.content_type)
    }

    pub fn was_redirected(&self) -> bool {
        self.requested_location != self.final_location
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body decoded with best-effort charset detection.
    pub fn text(&self) -> String {
        decode_text(&self.body, &self.content_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    DnsResolutionFailed { message: String },
    ConnectionTimeout { message: String },
    /// Non-2xx status after redirects were followed.
    HttpStatus { code: u16, reason: String },
    Transport { message: String },
    /// A redirect pointed somewhere the guard refused; it was not requested.
    RedirectRefused { location: Location },
}

impl FetchError {
    /// Short form used in audit titles.
    pub fn summary(&self) -> String {
        match self {
            Self::DnsResolutionFailed { .. } => "DNS resolution failed".to_owned(),
            Self::ConnectionTimeout { .. } => "Connection timed out".to_owned(),
            Self::HttpStatus { code, reason } if reason.is_empty() => code.to_string(),
            Self::HttpStatus { code, reason } => format!("{code} {reason}"),
            Self::Transport { message } => message.clone(),
            Self::RedirectRefused { .. } => "Redirect refused".to_owned(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DnsResolutionFailed { message } => write!(f, "DNS resolution failed: {message}"),
            Self::ConnectionTimeout { message } => write!(f, "connection timed out: {message}"),
            Self::HttpStatus { code, reason } => write!(f, "HTTP error {code} {reason}"),
            Self::Transport { message } => write!(f, "transport error: {message}"),
            Self::RedirectRefused { location } => write!(f, "redirect to {location} refused"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<BrowserError> for FetchError {
    fn from(error: BrowserError) -> Self {
        if error.code.ends_with("timeout") {
            Self::ConnectionTimeout {
                message: error.message,
            }
        } else if error.is_in("net.dns") {
            Self::DnsResolutionFailed {
                message: error.message,
            }
        } else {
            Self::Transport {
                message: error.to_string(),
            }
        }
    }
}

/// Decides whether a redirect hop may be requested.
pub type RedirectGuard = Arc<dyn Fn(&Location) -> bool + Send + Sync>;

/// Anything that can turn a location into a response.
pub trait PageFetcher {
    /// `timeout` bounds the whole call, redirects included.
    fn fetch(&mut self, location: &Location, timeout: Duration) -> Result<FetchResult, FetchError>;

    /// Switches how connections leave the process. Fetchers without a
    /// network path ignore it.
    fn set_route(&mut self, _route: Route) {}

    /// Installs a check run on every redirect target before it is requested.
    fn set_redirect_guard(&mut self, _guard: RedirectGuard) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherOptions {
    pub user_agent: String,
    pub max_redirects: usize,
    pub route: Route,
    pub tls: TlsPolicy,
    pub resolve_timeout: Duration,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            route: Route::Direct,
            tls: TlsPolicy::default(),
            resolve_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Network-backed [`PageFetcher`].
pub struct HttpFetcher {
    client: HttpClient<RoutedTransport, RustlsConnector>,
    user_agent: String,
    max_redirects: usize,
    redirect_guard: Option<RedirectGuard>,
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("route", &self.route())
            .field("max_redirects", &self.max_redirects)
            .field("redirect_guard", &self.redirect_guard.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpFetcher {
    pub fn new(options: FetcherOptions) -> BrowserResult<Self> {
        let connector = RustlsConnector::new(&options.tls)?;
        let transport =
            RoutedTransport::new(options.route, SystemDnsResolver::new(options.resolve_timeout));
        Ok(Self {
            client: HttpClient::with_parts(transport, connector, options.tls)?,
            user_agent: options.user_agent,
            max_redirects: options.max_redirects,
            redirect_guard: None,
        })
    }

    pub fn route(&self) -> Route {
        self.client.transport().route()
    }

    fn prepare_get(&self, location: &Location) -> BrowserResult<HttpRequest> {
        HttpRequest::builder(HttpMethod::Get, location.clone())
            .header("User-Agent", &self.user_agent)?
            .header("Accept", ACCEPT)?
            .header("Accept-Language", ACCEPT_LANGUAGE)?
            .header("Accept-Encoding", "gzip, deflate, br")?
            .header("Connection", "close")?
            .header("Upgrade-Insecure-Requests", "1")?
            .build()
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&mut self, location: &Location, timeout: Duration) -> Result<FetchResult, FetchError> {
        let deadline = Instant::now() + timeout;
        let mut current = location.clone();
        let mut redirects_followed = 0_usize;

        loop {
            if Instant::now() >= deadline {
                return Err(FetchError::ConnectionTimeout {
                    message: format!("loading {location} took longer than {timeout:?}"),
                });
            }

            debug!("GET {current}");
            let request = self.prepare_get(&current)?;
            let response = self.client.execute_until(&request, deadline)?;
            let status = response.status;

            if status.is_redirect() {
                if let Some(target) = response.header("location") {
                    if redirects_followed >= self.max_redirects {
                        return Err(FetchError::Transport {
                            message: format!(
                                "too many redirects (>{}) while loading {location}",
                                self.max_redirects
                            ),
                        });
                    }

                    let next = current.join(target)?;
                    if let Some(guard) = &self.redirect_guard {
                        if !guard(&next) {
                            debug!("redirect {current} -> {next} refused");
                            return Err(FetchError::RedirectRefused { location: next });
                        }
                    }
                    debug!("{} redirect {current} -> {next}", status.as_u16());
                    current = next;
                    redirects_followed = redirects_followed.saturating_add(1);
                    continue;
                }
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    code: status.as_u16(),
                    reason: response.reason,
                });
            }

            let content_type = response
                .header("content-type")
                .unwrap_or("unknown")
                .to_owned();
            return Ok(FetchResult {
                requested_location: location.clone(),
                final_location: current,
                status_code: status.as_u16(),
                content_type,
                headers: response.headers,
                body: response.body,
            });
        }
    }

    fn set_route(&mut self, route: Route) {
        debug!("switching route to {route:?}");
        self.client.transport_mut().set_route(route);
    }

    fn set_redirect_guard(&mut self, guard: RedirectGuard) {
        self.redirect_guard = Some(guard);
    }
}
