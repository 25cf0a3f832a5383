//! Canonical navigation targets and free-text input normalization.

use crate::BrowserError;
use crate::BrowserResult;
use core::fmt;
use core::str::FromStr;
use url::Url;
use url::form_urlencoded;

const ONION_SUFFIX: &str = ".onion";

/// Supported navigation schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Self::Https)
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// An absolute http(s) URL with its derived domain and scheme.
///
/// A `Location` is never empty: construction goes through [`Location::parse`]
/// or [`normalize_input`], both of which reject anything without a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    parsed: Url,
    scheme: Scheme,
    domain: String,
    port: u16,
}

impl Location {
    pub fn parse(input: &str) -> BrowserResult<Self> {
        let mut parsed = Url::parse(input.trim()).map_err(|error| {
            BrowserError::new(
                "core.location.invalid",
                format!("failed to parse URL `{input}`: {error}"),
            )
        })?;

        let scheme = match parsed.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(BrowserError::new(
                    "core.location.scheme_unsupported",
                    format!("unsupported scheme `{other}`"),
                ));
            }
        };

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(BrowserError::new(
                "core.location.credentials_disallowed",
                "URL userinfo (`username:password@`) is not allowed",
            ));
        }

        let domain = parsed
            .host_str()
            .map(normalize_host)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                BrowserError::new("core.location.host_missing", "URL must include a host")
            })?;

        let port = parsed
            .port_or_known_default()
            .unwrap_or_else(|| scheme.default_port());

        // Fragments never reach the wire and never distinguish history entries.
        parsed.set_fragment(None);

        Ok(Self {
            parsed,
            scheme,
            domain,
            port,
        })
    }

    /// Resolves `reference` against this location using standard relative-URL rules.
    pub fn join(&self, reference: &str) -> BrowserResult<Self> {
        let joined = self.parsed.join(reference.trim()).map_err(|error| {
            BrowserError::new(
                "core.location.join_failed",
                format!("failed to resolve `{reference}` against `{self}`: {error}"),
            )
        })?;
        Self::parse(joined.as_str())
    }

    /// Like [`Location::join`], but keeps targets of any scheme
    /// (`mailto:`, `ftp:`) as resolved text.
    pub fn resolve_reference(&self, reference: &str) -> Option<String> {
        self.parsed
            .join(reference.trim())
            .ok()
            .map(|joined| joined.to_string())
    }

    pub fn as_str(&self) -> &str {
        self.parsed.as_str()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Lower-cased host without port or credentials.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_secure()
    }

    pub fn is_onion(&self) -> bool {
        is_onion_host(&self.domain)
    }

    pub fn path(&self) -> &str {
        self.parsed.path()
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.parsed
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.domain.clone()
        } else {
            format!("{}:{}", self.domain, self.port)
        }
    }

    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.authority())
    }

    pub fn path_and_query(&self) -> String {
        let path = if self.parsed.path().is_empty() {
            "/"
        } else {
            self.parsed.path()
        };

        match self.parsed.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search engines that free-text input can be rewritten into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchEngine {
    #[default]
    Google,
    DuckDuckGo,
}

impl SearchEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::DuckDuckGo => "duckduckgo",
        }
    }

    fn query_prefix(self) -> &'static str {
        match self {
            Self::Google => "https://www.google.com/search?q=",
            Self::DuckDuckGo => "https://duckduckgo.com/html/?q=",
        }
    }

    pub fn query_location(self, query: &str) -> BrowserResult<Location> {
        let encoded: String = form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
        Location::parse(&format!("{}{encoded}", self.query_prefix()))
    }
}

impl FromStr for SearchEngine {
    type Err = BrowserError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            other => Err(BrowserError::new(
                "core.search_engine.unknown",
                format!("unknown search engine `{other}` (expected google or duckduckgo)"),
            )),
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns user input into a canonical [`Location`].
///
/// Input that already carries `http://` or `https://` is parsed as-is. Input
/// containing whitespace or lacking a `.` becomes a query on `engine`.
/// Everything else gets the `http://` default scheme.
pub fn normalize_input(input: &str, engine: SearchEngine) -> BrowserResult<Location> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(BrowserError::new(
            "core.location.empty",
            "navigation target is empty",
        ));
    }

    if has_http_scheme(trimmed) {
        return Location::parse(trimmed);
    }

    if looks_like_search(trimmed) {
        return engine.query_location(trimmed);
    }

    Location::parse(&format!("http://{trimmed}"))
}

pub fn is_onion_host(host: &str) -> bool {
    normalize_host(host).ends_with(ONION_SUFFIX)
}

pub(crate) fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn has_http_scheme(input: &str) -> bool {
    ["http://", "https://"].iter().any(|prefix| {
        input
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

fn looks_like_search(input: &str) -> bool {
    input.contains(char::is_whitespace) || !input.contains('.')
}
