//! rustls-backed TLS upgrade.

use crate::tls::TlsHandshakeConfig;
use crate::tls::TlsPolicy;
use crate::tls::TlsVersion;
use crate::tls::TrustStoreMode;
use crate::transport::BoxedIoStream;
use log::warn;
use rustls::ClientConfig;
use rustls::ClientConnection;
use rustls::RootCertStore;
use rustls::StreamOwned;
use rustls::SupportedProtocolVersion;
use rustls::pki_types::ServerName;
use std::net::TcpStream;
use std::sync::Arc;
use tw_core::BrowserError;
use tw_core::BrowserResult;

/// Upgrades a connected TCP stream to TLS.
pub trait TlsConnector: Send + Sync {
    fn connect_tls(
        &self,
        stream: TcpStream,
        handshake: &TlsHandshakeConfig,
    ) -> BrowserResult<BoxedIoStream>;
}

/// Holds prebuilt client configs so roots are loaded once per fetcher.
#[derive(Debug, Clone)]
pub struct RustlsConnector {
    with_sni: Arc<ClientConfig>,
    without_sni: Arc<ClientConfig>,
}

impl RustlsConnector {
    pub fn new(policy: &TlsPolicy) -> BrowserResult<Self> {
        policy.validate()?;

        let versions = supported_versions(policy.minimum_version, policy.maximum_version);
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let roots = Arc::new(root_store(policy.trust_store_mode)?);

        let mut config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&versions)
            .map_err(|error| {
                BrowserError::new(
                    "net.tls.config_versions_invalid",
                    format!("failed to configure TLS protocol versions: {error}"),
                )
            })?
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        let mut without_sni = config.clone();
        without_sni.enable_sni = false;

        Ok(Self {
            with_sni: Arc::new(config),
            without_sni: Arc::new(without_sni),
        })
    }
}

impl TlsConnector for RustlsConnector {
    fn connect_tls(
        &self,
        mut stream: TcpStream,
        handshake: &TlsHandshakeConfig,
    ) -> BrowserResult<BoxedIoStream> {
        let config = if handshake.enable_sni {
            Arc::clone(&self.with_sni)
        } else {
            Arc::clone(&self.without_sni)
        };

        let server_name = ServerName::try_from(handshake.server_name.clone()).map_err(|error| {
            BrowserError::new(
                "net.tls.server_name_invalid",
                format!("invalid TLS server name `{}`: {error}", handshake.server_name),
            )
        })?;

        let mut connection = ClientConnection::new(config, server_name).map_err(|error| {
            BrowserError::new(
                "net.tls.connection_init_failed",
                format!(
                    "failed to initialize TLS connection for `{}`: {error}",
                    handshake.server_name
                ),
            )
        })?;

        while connection.is_handshaking() {
            connection.complete_io(&mut stream).map_err(|error| {
                crate::transport::io_failure(
                    "net.tls.handshake_failed",
                    &format!("TLS handshake with `{}`", handshake.server_name),
                    &error,
                )
            })?;
        }

        Ok(Box::new(StreamOwned::new(connection, stream)))
    }
}

fn root_store(mode: TrustStoreMode) -> BrowserResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if mode == TrustStoreMode::WebPkiAndOs {
        let native = rustls_native_certs::load_native_certs();
        for error in &native.errors {
            warn!("skipping operating-system roots: {error}");
        }
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        if ignored > 0 {
            warn!("ignored {ignored} unparsable operating-system roots ({added} added)");
        }
    }

    if roots.is_empty() {
        return Err(BrowserError::new(
            "net.tls.root_store_empty",
            "no trust anchors available for TLS verification",
        ));
    }

    Ok(roots)
}

fn supported_versions(
    minimum: TlsVersion,
    maximum: TlsVersion,
) -> Vec<&'static SupportedProtocolVersion> {
    [
        (TlsVersion::V1_3, &rustls::version::TLS13),
        (TlsVersion::V1_2, &rustls::version::TLS12),
    ]
    .into_iter()
    .filter(|(version, _)| *version >= minimum && *version <= maximum)
    .map(|(_, supported)| supported)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::RustlsConnector;
    use super::supported_versions;
    use crate::tls::TlsPolicy;
    use crate::tls::TlsVersion;

    #[test]
    fn version_window_is_respected() {
        assert_eq!(supported_versions(TlsVersion::V1_2, TlsVersion::V1_3).len(), 2);
        assert_eq!(supported_versions(TlsVersion::V1_3, TlsVersion::V1_3).len(), 1);
    }

    #[test]
    fn connector_builds_from_default_policy() {
        assert!(RustlsConnector::new(&TlsPolicy::default()).is_ok());
    }

    #[test]
    fn inverted_policy_is_refused() {
        let policy = TlsPolicy {
            minimum_version: TlsVersion::V1_3,
            maximum_version: TlsVersion::V1_2,
            ..TlsPolicy::default()
        };
        assert!(RustlsConnector::new(&policy).is_err());
    }
}
