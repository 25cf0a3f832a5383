//! Shared primitives used across textweb crates.

pub mod firewall;
pub mod location;
pub mod lookup;

use core::fmt;

pub use location::Location;
pub use location::Scheme;
pub use location::SearchEngine;
pub use lookup::AddressLookup;

/// Result alias used across the workspace.
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Plumbing-level error carrying a dotted, crate-scoped code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserError {
    pub code: &'static str,
    pub message: String,
}

impl BrowserError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// True when the code belongs to the given dotted family, e.g. `net.dns`.
    pub fn is_in(&self, family: &str) -> bool {
        self.code == family
            || self
                .code
                .strip_prefix(family)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BrowserError {}

#[cfg(test)]
mod tests {
    use super::BrowserError;

    #[test]
    fn display_includes_code_and_message() {
        let error = BrowserError::new("net.dns.timeout", "lookup took too long");
        assert_eq!(error.to_string(), "net.dns.timeout: lookup took too long");
    }

    #[test]
    fn family_match_respects_segment_boundaries() {
        let error = BrowserError::new("net.dns.no_results", "none");
        assert!(error.is_in("net.dns"));
        assert!(error.is_in("net"));
        assert!(!error.is_in("net.d"));
        assert!(!error.is_in("storage"));
    }
}
