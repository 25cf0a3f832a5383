//! SOCKS5 client handshake (RFC 1928): no authentication, CONNECT only.
//!
//! Host names are sent to the proxy unresolved so `.onion` names and
//! remote DNS work.

use crate::transport::io_failure;
use std::io::Read;
use std::io::Write;
use std::net::IpAddr;
use tw_core::BrowserError;
use tw_core::BrowserResult;

const VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_NONE_ACCEPTABLE: u8 = 0xff;
const COMMAND_CONNECT: u8 = 0x01;
const ADDRESS_IPV4: u8 = 0x01;
const ADDRESS_DOMAIN: u8 = 0x03;
const ADDRESS_IPV6: u8 = 0x04;
const REPLY_SUCCEEDED: u8 = 0x00;

/// Runs the greeting and CONNECT exchange; on success `stream` carries the
/// tunnelled connection.
pub fn connect<S: Read + Write>(stream: &mut S, host: &str, port: u16) -> BrowserResult<()> {
    let request = connect_request(host, port)?;

    stream
        .write_all(&[VERSION, 1, METHOD_NO_AUTH])
        .map_err(|error| io_failure("net.socks.io_failed", "socks greeting", &error))?;

    let mut choice = [0_u8; 2];
    read_exact(stream, &mut choice, "socks method selection")?;
    if choice[0] != VERSION {
        return Err(protocol_error(format!(
            "proxy answered with version {:#04x}",
            choice[0]
        )));
    }
    match choice[1] {
        METHOD_NO_AUTH => {}
        METHOD_NONE_ACCEPTABLE => {
            return Err(BrowserError::new(
                "net.socks.auth_rejected",
                "proxy requires authentication",
            ));
        }
        other => {
            return Err(protocol_error(format!(
                "proxy selected unsupported method {other:#04x}"
            )));
        }
    }

    stream
        .write_all(&request)
        .map_err(|error| io_failure("net.socks.io_failed", "socks connect request", &error))?;

    let mut reply = [0_u8; 4];
    read_exact(stream, &mut reply, "socks connect reply")?;
    if reply[0] != VERSION {
        return Err(protocol_error(format!(
            "proxy answered with version {:#04x}",
            reply[0]
        )));
    }
    if reply[1] != REPLY_SUCCEEDED {
        return Err(reply_error(reply[1], host, port));
    }

    // Bound address and port; unused but must be drained.
    let remaining = match reply[3] {
        ADDRESS_IPV4 => 4 + 2,
        ADDRESS_IPV6 => 16 + 2,
        ADDRESS_DOMAIN => {
            let mut length = [0_u8; 1];
            read_exact(stream, &mut length, "socks bound address")?;
            usize::from(length[0]) + 2
        }
        other => {
            return Err(protocol_error(format!(
                "unknown bound address type {other:#04x}"
            )));
        }
    };
    let mut bound = vec![0_u8; remaining];
    read_exact(stream, &mut bound, "socks bound address")?;

    Ok(())
}

fn connect_request(host: &str, port: u16) -> BrowserResult<Vec<u8>> {
    let mut request = vec![VERSION, COMMAND_CONNECT, 0x00];
    let bare = host.trim_start_matches('[').trim_end_matches(']');

    match bare.parse::<IpAddr>() {
        Ok(IpAddr::V4(address)) => {
            request.push(ADDRESS_IPV4);
            request.extend_from_slice(&address.octets());
        }
        Ok(IpAddr::V6(address)) => {
            request.push(ADDRESS_IPV6);
            request.extend_from_slice(&address.octets());
        }
        Err(_) => {
            let length = u8::try_from(bare.len())
                .ok()
                .filter(|length| *length > 0)
                .ok_or_else(|| {
                    BrowserError::new(
                        "net.socks.host_invalid",
                        format!("host `{bare}` cannot be sent to a SOCKS5 proxy"),
                    )
                })?;
            request.push(ADDRESS_DOMAIN);
            request.push(length);
            request.extend_from_slice(bare.as_bytes());
        }
    }

    request.extend_from_slice(&port.to_be_bytes());
    Ok(request)
}

fn read_exact<S: Read>(stream: &mut S, buffer: &mut [u8], context: &str) -> BrowserResult<()> {
    stream
        .read_exact(buffer)
        .map_err(|error| io_failure("net.socks.io_failed", context, &error))
}

fn protocol_error(message: String) -> BrowserError {
    BrowserError::new("net.socks.protocol_invalid", message)
}

fn reply_error(code: u8, host: &str, port: u16) -> BrowserError {
    let (error_code, reason) = match code {
        0x01 => ("net.socks.connect_failed", "general proxy failure"),
        0x02 => ("net.socks.connect_failed", "connection not allowed by ruleset"),
        0x03 => ("net.socks.connect_failed", "network unreachable"),
        0x04 => ("net.socks.host_unreachable", "host unreachable"),
        0x05 => ("net.socks.connect_failed", "connection refused"),
        0x06 => ("net.socks.timeout", "TTL expired"),
        0x07 => ("net.socks.connect_failed", "command not supported"),
        0x08 => ("net.socks.connect_failed", "address type not supported"),
        _ => ("net.socks.connect_failed", "unknown proxy error"),
    };
    BrowserError::new(
        error_code,
        format!("proxy could not reach {host}:{port}: {reason}"),
    )
}
