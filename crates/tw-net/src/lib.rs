//! Networking for textweb: a one-request-per-connection HTTP/1.1 client
//! over direct TCP or a SOCKS5 tunnel, with rustls for HTTPS.

pub mod charset;
pub mod client;
pub mod dns;
pub mod fetch;
pub mod http;
pub mod socks;
pub mod tls;
pub mod tls_backend;
pub mod transport;

pub use dns::SystemDnsResolver;
pub use fetch::ContentKind;
pub use fetch::FetchError;
pub use fetch::FetchResult;
pub use fetch::FetcherOptions;
pub use fetch::HttpFetcher;
pub use fetch::PageFetcher;
pub use fetch::RedirectGuard;
pub use transport::Route;
pub use transport::probe;
