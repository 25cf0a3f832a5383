//! Address lookup that goes quiet while traffic is routed through the proxy.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tw_core::AddressLookup;

/// Shared by the session and the visit store so that enabling the proxy
/// also stops local DNS queries made for display and visit records.
pub struct RoutedLookup {
    inner: Arc<dyn AddressLookup>,
    suppressed: AtomicBool,
}

impl RoutedLookup {
    pub fn new(inner: Arc<dyn AddressLookup>) -> Self {
        Self {
            inner,
            suppressed: AtomicBool::new(false),
        }
    }

    pub fn set_suppressed(&self, suppressed: bool) {
        self.suppressed.store(suppressed, Ordering::Relaxed);
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::Relaxed)
    }
}

impl AddressLookup for RoutedLookup {
    fn lookup(&self, host: &str) -> Option<IpAddr> {
        if self.is_suppressed() {
            return None;
        }
        self.inner.lookup(host)
    }
}

#[cfg(test)]
mod tests {
    use super::RoutedLookup;
    use std::net::IpAddr;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use tw_core::AddressLookup;

    struct Fixed;

    impl AddressLookup for Fixed {
        fn lookup(&self, _host: &str) -> Option<IpAddr> {
            Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)))
        }
    }

    #[test]
    fn suppression_hides_inner_results() {
        let lookup = RoutedLookup::new(Arc::new(Fixed));
        assert!(lookup.lookup("example.com").is_some());

        lookup.set_suppressed(true);
        assert_eq!(lookup.lookup("example.com"), None);

        lookup.set_suppressed(false);
        assert!(lookup.lookup("example.com").is_some());
    }
}
