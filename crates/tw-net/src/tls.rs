//! TLS policy for HTTPS navigation.

use std::net::IpAddr;
use tw_core::BrowserError;
use tw_core::BrowserResult;
use tw_core::Location;

/// Supported TLS protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    V1_2,
    V1_3,
}

impl TlsVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_2 => "TLS1.2",
            Self::V1_3 => "TLS1.3",
        }
    }
}

/// Controls which trust anchors verify server certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustStoreMode {
    /// Embedded Mozilla roots only.
    WebPkiOnly,
    /// Embedded roots plus the operating-system store.
    WebPkiAndOs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    pub minimum_version: TlsVersion,
    pub maximum_version: TlsVersion,
    pub trust_store_mode: TrustStoreMode,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            minimum_version: TlsVersion::V1_2,
            maximum_version: TlsVersion::V1_3,
            trust_store_mode: TrustStoreMode::WebPkiOnly,
        }
    }
}

/// Per-connection handshake parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsHandshakeConfig {
    pub server_name: String,
    /// SNI is only meaningful for DNS names.
    pub enable_sni: bool,
}

impl TlsPolicy {
    pub fn with_trust_store_mode(mut self, mode: TrustStoreMode) -> Self {
        self.trust_store_mode = mode;
        self
    }

    pub fn validate(&self) -> BrowserResult<()> {
        if self.minimum_version > self.maximum_version {
            return Err(BrowserError::new(
                "net.tls.invalid_version_range",
                format!(
                    "minimum TLS version {} is above maximum {}",
                    self.minimum_version.as_str(),
                    self.maximum_version.as_str()
                ),
            ));
        }
        Ok(())
    }

    /// `None` for plain HTTP.
    pub fn handshake_config_for(&self, location: &Location) -> Option<TlsHandshakeConfig> {
        if !location.is_secure() {
            return None;
        }

        let server_name = location
            .domain()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_owned();
        let enable_sni = server_name.parse::<IpAddr>().is_err();
        Some(TlsHandshakeConfig {
            server_name,
            enable_sni,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::TlsPolicy;
    use super::TlsVersion;
    use super::TrustStoreMode;
    use tw_core::Location;

    fn location(raw: &str) -> Location {
        match Location::parse(raw) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn validates_version_range() {
        let policy = TlsPolicy {
            minimum_version: TlsVersion::V1_3,
            maximum_version: TlsVersion::V1_2,
            ..TlsPolicy::default()
        };
        assert!(policy.validate().is_err());
        assert!(TlsPolicy::default().validate().is_ok());
    }

    #[test]
    fn only_https_gets_a_handshake() {
        let policy = TlsPolicy::default();
        assert!(policy.handshake_config_for(&location("http://example.com/")).is_none());

        let handshake = policy.handshake_config_for(&location("https://Example.com/a"));
        assert_eq!(
            handshake.map(|config| (config.server_name, config.enable_sni)),
            Some(("example.com".to_owned(), true))
        );
    }

    #[test]
    fn ip_hosts_skip_sni() {
        let policy = TlsPolicy::default();
        let handshake = policy.handshake_config_for(&location("https://192.0.2.1/"));
        assert_eq!(handshake.map(|config| config.enable_sni), Some(false));

        let handshake = policy.handshake_config_for(&location("https://[2001:db8::1]/"));
        assert_eq!(
            handshake.map(|config| config.server_name),
            Some("2001:db8::1".to_owned())
        );
    }

    #[test]
    fn trust_store_mode_can_be_overridden() {
        let policy = TlsPolicy::default().with_trust_store_mode(TrustStoreMode::WebPkiAndOs);
        assert_eq!(policy.trust_store_mode, TrustStoreMode::WebPkiAndOs);
    }
}
