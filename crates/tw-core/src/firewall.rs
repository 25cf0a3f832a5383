//! Exact-or-subdomain matching of navigation targets against blocked domains.

use crate::location::normalize_host;
use std::collections::BTreeSet;
use url::Url;

/// Returns true if `location` falls under any domain in `blocked`.
///
/// A target whose host equals a blocked domain, or ends with `.` followed by
/// one, is blocked. Unparseable targets and targets without a host (such as
/// `about:blank`) are never blocked.
pub fn is_blocked(location: &str, blocked: &BTreeSet<String>) -> bool {
    match host_of(location) {
        Some(domain) => is_domain_blocked(&domain, blocked),
        None => false,
    }
}

/// Same predicate as [`is_blocked`], for a host that is already extracted.
pub fn is_domain_blocked(domain: &str, blocked: &BTreeSet<String>) -> bool {
    let domain = normalize_host(domain);
    if domain.is_empty() {
        return false;
    }

    blocked
        .iter()
        .any(|rule| domain_matches(&domain, rule))
}

fn domain_matches(domain: &str, rule: &str) -> bool {
    let rule = normalize_host(rule);
    if rule.is_empty() {
        return false;
    }

    domain == rule
        || domain
            .strip_suffix(rule.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Reduces a bare domain or a full URL to the canonical stored rule form.
pub fn canonical_domain(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let host = if trimmed.contains("://") {
        host_of(trimmed)?
    } else {
        let probe = format!("http://{trimmed}");
        host_of(&probe)?
    };

    if host.is_empty() { None } else { Some(host) }
}

fn host_of(location: &str) -> Option<String> {
    let parsed = Url::parse(location.trim()).ok()?;
    parsed.host_str().map(normalize_host)
}
