//! Host name resolution with a hard deadline.

use log::debug;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;
use tw_core::AddressLookup;
use tw_core::BrowserError;
use tw_core::BrowserResult;

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Name resolution abstraction.
pub trait DnsResolver: Send + Sync {
    fn resolve(&self, host: &str, port: u16) -> BrowserResult<Vec<SocketAddr>>;
}

/// Operating system resolver. The blocking lookup runs on a helper thread
/// so a stalled resolver cannot hold the caller past `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct SystemDnsResolver {
    timeout: Duration,
}

impl SystemDnsResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemDnsResolver {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLVE_TIMEOUT)
    }
}

impl DnsResolver for SystemDnsResolver {
    fn resolve(&self, host: &str, port: u16) -> BrowserResult<Vec<SocketAddr>> {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(address) = bare.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(address, port)]);
        }

        let query = format!("{host}:{port}");
        let (sender, receiver) = mpsc::channel();
        let lookup = query.clone();
        thread::Builder::new()
            .name("dns-lookup".to_owned())
            .spawn(move || {
                let result = lookup
                    .to_socket_addrs()
                    .map(|addresses| addresses.collect::<Vec<_>>());
                // The receiver may have given up already.
                let _ = sender.send(result);
            })
            .map_err(|error| {
                BrowserError::new(
                    "net.dns.spawn_failed",
                    format!("failed to start resolver thread: {error}"),
                )
            })?;

        let addresses = match receiver.recv_timeout(self.timeout) {
            Ok(Ok(addresses)) => addresses,
            Ok(Err(error)) => {
                return Err(BrowserError::new(
                    "net.dns.resolve_failed",
                    format!("failed to resolve `{query}`: {error}"),
                ));
            }
            Err(RecvTimeoutError::Timeout) => {
                return Err(BrowserError::new(
                    "net.dns.timeout",
                    format!(
                        "resolving `{query}` took longer than {}s",
                        self.timeout.as_secs()
                    ),
                ));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(BrowserError::new(
                    "net.dns.resolve_failed",
                    format!("resolver thread for `{query}` exited without an answer"),
                ));
            }
        };

        if addresses.is_empty() {
            return Err(BrowserError::new(
                "net.dns.no_results",
                format!("resolver returned no addresses for `{query}`"),
            ));
        }

        debug!("resolved {query} to {} address(es)", addresses.len());
        Ok(addresses)
    }
}

impl AddressLookup for SystemDnsResolver {
    fn lookup(&self, host: &str) -> Option<IpAddr> {
        let addresses = self.resolve(host, 80).ok()?;
        addresses
            .iter()
            .find(|address| address.is_ipv4())
            .or_else(|| addresses.first())
            .map(SocketAddr::ip)
    }
}

#[cfg(test)]
mod tests {
    use super::DnsResolver;
    use super::SystemDnsResolver;
    use std::net::IpAddr;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tw_core::AddressLookup;

    #[test]
    fn ip_literals_skip_the_resolver() {
        let resolver = SystemDnsResolver::new(Duration::from_millis(1));

        let resolved = resolver.resolve("127.0.0.1", 8080);
        assert!(resolved.is_ok());
        let resolved = match resolved {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].port(), 8080);

        let v6 = resolver.resolve("[::1]", 443);
        assert!(v6.is_ok());
    }

    #[test]
    fn lookup_returns_the_literal_address() {
        let resolver = SystemDnsResolver::default();
        assert_eq!(
            resolver.lookup("10.0.0.7"),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)))
        );
    }
}
