//! Best-effort host address lookup used for display and visit records.

use crate::location::is_onion_host;
use std::net::IpAddr;

/// Sentinel recorded when a host cannot be resolved.
pub const UNKNOWN_ADDRESS: &str = "Unknown";
/// Shown instead of an address for hosts only reachable through the proxy.
pub const HIDDEN_ADDRESS: &str = "Hidden (proxy network)";

/// Resolves a host name to one address, or nothing.
///
/// Implementations must bound their own running time.
pub trait AddressLookup: Send + Sync {
    fn lookup(&self, host: &str) -> Option<IpAddr>;
}

/// Lookup that never resolves. Used when local DNS must not be consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl AddressLookup for NoLookup {
    fn lookup(&self, _host: &str) -> Option<IpAddr> {
        None
    }
}

/// Display form of a host's address, falling back to [`UNKNOWN_ADDRESS`].
pub fn display_address(lookup: &dyn AddressLookup, host: &str) -> String {
    if host.trim().is_empty() {
        return UNKNOWN_ADDRESS.to_owned();
    }

    if is_onion_host(host) {
        return HIDDEN_ADDRESS.to_owned();
    }

    lookup
        .lookup(host)
        .map(|address| address.to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_owned())
}
