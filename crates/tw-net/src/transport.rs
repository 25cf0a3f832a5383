//! TCP transports: direct connections and SOCKS5 tunnels.

use crate::dns::DnsResolver;
use crate::dns::SystemDnsResolver;
use crate::socks;
use log::debug;
use std::io;
use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::time::Duration;
use tw_core::BrowserError;
use tw_core::BrowserResult;

/// Trait-object-safe stream handed to the HTTP layer.
pub trait IoStream: Read + Write + Send {}
impl<T> IoStream for T where T: Read + Write + Send {}

pub type BoxedIoStream = Box<dyn IoStream>;

/// Opens a TCP stream to `host:port`, however the route demands.
pub trait Transport: Send + Sync {
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> BrowserResult<TcpStream>;
}

/// Where outbound connections go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    /// Tunnel through a SOCKS5 proxy; names are resolved by the proxy.
    Socks5(SocketAddr),
}

/// Resolves locally and connects straight to the origin.
#[derive(Debug, Clone, Default)]
pub struct DirectTransport<R: DnsResolver = SystemDnsResolver> {
    resolver: R,
}

impl<R: DnsResolver> DirectTransport<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }
}

impl<R: DnsResolver> Transport for DirectTransport<R> {
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> BrowserResult<TcpStream> {
        let addresses = self.resolver.resolve(host, port)?;
        let mut last_error = None;

        for address in addresses {
            match open_stream(address, timeout) {
                Ok(stream) => return Ok(stream),
                Err(error) => {
                    debug!("connect to {address} failed: {error}");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BrowserError::new(
                "net.transport.connect_failed",
                format!("no addresses to connect to for `{host}:{port}`"),
            )
        }))
    }
}

/// Connects through a SOCKS5 proxy that performs the name lookup itself.
#[derive(Debug, Clone, Copy)]
pub struct Socks5Transport {
    proxy: SocketAddr,
}

impl Socks5Transport {
    pub fn new(proxy: SocketAddr) -> Self {
        Self { proxy }
    }
}

impl Transport for Socks5Transport {
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> BrowserResult<TcpStream> {
        let mut stream = open_stream(self.proxy, timeout).map_err(|error| {
            BrowserError::new(
                if error.code.ends_with("timeout") {
                    "net.socks.proxy_timeout"
                } else {
                    "net.socks.proxy_unreachable"
                },
                format!("proxy {} is unreachable: {}", self.proxy, error.message),
            )
        })?;
        socks::connect(&mut stream, host, port)?;
        debug!("tunnel to {host}:{port} open via {}", self.proxy);
        Ok(stream)
    }
}

/// Transport whose route can be switched at runtime.
#[derive(Debug, Clone)]
pub struct RoutedTransport<R: DnsResolver = SystemDnsResolver> {
    route: Route,
    direct: DirectTransport<R>,
}

impl<R: DnsResolver> RoutedTransport<R> {
    pub fn new(route: Route, resolver: R) -> Self {
        Self {
            route,
            direct: DirectTransport::new(resolver),
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn set_route(&mut self, route: Route) {
        self.route = route;
    }
}

impl<R: DnsResolver> Transport for RoutedTransport<R> {
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> BrowserResult<TcpStream> {
        match self.route {
            Route::Direct => self.direct.connect(host, port, timeout),
            Route::Socks5(proxy) => Socks5Transport::new(proxy).connect(host, port, timeout),
        }
    }
}

/// True when something accepts TCP connections at `address`.
pub fn probe(address: SocketAddr, timeout: Duration) -> bool {
    TcpStream::connect_timeout(&address, timeout).is_ok()
}

fn open_stream(address: SocketAddr, timeout: Duration) -> BrowserResult<TcpStream> {
    let stream = TcpStream::connect_timeout(&address, timeout)
        .map_err(|error| io_failure("net.transport.connect_failed", &address.to_string(), &error))?;

    stream.set_nodelay(true).map_err(|error| {
        BrowserError::new(
            "net.transport.nodelay_failed",
            format!("failed to enable TCP_NODELAY for `{address}`: {error}"),
        )
    })?;

    stream.set_read_timeout(Some(timeout)).map_err(|error| {
        BrowserError::new(
            "net.transport.read_timeout_failed",
            format!("failed to set read timeout for `{address}`: {error}"),
        )
    })?;

    stream.set_write_timeout(Some(timeout)).map_err(|error| {
        BrowserError::new(
            "net.transport.write_timeout_failed",
            format!("failed to set write timeout for `{address}`: {error}"),
        )
    })?;

    Ok(stream)
}

/// Maps an io error to `code`, or to `net.io.timeout` when a deadline elapsed.
pub(crate) fn io_failure(code: &'static str, context: &str, error: &io::Error) -> BrowserError {
    match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            BrowserError::new("net.io.timeout", format!("{context}: timed out ({error})"))
        }
        _ => BrowserError::new(code, format!("{context}: {error}")),
    }
}
