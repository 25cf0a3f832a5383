//! One-shot HTTP/1.1 client: every request opens a fresh connection and
//! asks the server to close it.

use crate::http::Header;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::http::HttpStatusCode;
use crate::http::HttpVersion;
use crate::http::find_header;
use crate::http::header_has_token;
use crate::tls::TlsPolicy;
use crate::tls_backend::TlsConnector;
use crate::transport::BoxedIoStream;
use crate::transport::Transport;
use crate::transport::io_failure;
use brotli::Decompressor;
use flate2::read::DeflateDecoder;
use flate2::read::GzDecoder;
use flate2::read::ZlibDecoder;
use log::debug;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;
use std::time::Instant;
use tw_core::BrowserError;
use tw_core::BrowserResult;

const MAX_LINE_BYTES: usize = 8 * 1024;
const MAX_HEADER_COUNT: usize = 256;
/// Upper bound for a body, before and after content decoding.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub struct HttpClient<T: Transport, C: TlsConnector> {
    transport: T,
    tls: C,
    policy: TlsPolicy,
    timeout: Duration,
}

impl<T: Transport, C: TlsConnector> HttpClient<T, C> {
    pub fn with_parts(transport: T, tls: C, policy: TlsPolicy) -> BrowserResult<Self> {
        policy.validate()?;
        Ok(Self {
            transport,
            tls,
            policy,
            timeout: Duration::from_secs(10),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Budget for one whole exchange, from connect to the last body byte.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn execute(&self, request: &HttpRequest) -> BrowserResult<HttpResponse> {
        self.execute_until(request, Instant::now() + self.timeout)
    }

    /// Runs one exchange that must finish before `deadline`.
    pub fn execute_until(
        &self,
        request: &HttpRequest,
        deadline: Instant,
    ) -> BrowserResult<HttpResponse> {
        let url = &request.url;
        let tcp = self
            .transport
            .connect(url.domain(), url.port(), remaining_until(deadline)?)?;
        let socket = tcp.try_clone().map_err(|error| {
            io_failure("net.transport.clone_failed", "sharing the socket", &error)
        })?;
        let inner: BoxedIoStream = match self.policy.handshake_config_for(url) {
            Some(handshake) => self.tls.connect_tls(tcp, &handshake)?,
            None => Box::new(tcp),
        };
        let mut stream = DeadlineStream {
            inner,
            socket,
            deadline,
        };

        write_request(&mut stream, request)?;
        let mut reader = BufReader::new(stream);
        let response = read_response(&mut reader, request.method)?;
        debug!(
            "{} {} -> {} ({} bytes)",
            request.method.as_str(),
            url,
            response.status.as_u16(),
            response.body.len()
        );
        Ok(response)
    }
}

fn remaining_until(deadline: Instant) -> BrowserResult<Duration> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(BrowserError::new(
            "net.io.timeout",
            "request deadline elapsed before the exchange finished",
        ));
    }
    Ok(remaining)
}

/// Shrinks the socket timeouts before every read and write so the whole
/// exchange, not each operation, is bounded by `deadline`.
struct DeadlineStream {
    inner: BoxedIoStream,
    socket: TcpStream,
    deadline: Instant,
}

impl DeadlineStream {
    fn remaining(&self) -> io::Result<Duration> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            Err(io::Error::new(io::ErrorKind::TimedOut, "request deadline elapsed"))
        } else {
            Ok(remaining)
        }
    }
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining()?;
        self.socket.set_read_timeout(Some(remaining))?;
        self.inner.read(buf)
    }
}

impl Write for DeadlineStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = self.remaining()?;
        self.socket.set_write_timeout(Some(remaining))?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn write_request(stream: &mut dyn Write, request: &HttpRequest) -> BrowserResult<()> {
    let mut head = format!(
        "{} {} {}\r\n",
        request.method.as_str(),
        request.request_target(),
        HttpVersion::Http11.as_str()
    );
    for header in &request.headers {
        head.push_str(&header.name);
        head.push_str(": ");
        head.push_str(&header.value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    stream
        .write_all(head.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(|error| io_failure("net.http.write_failed", "sending request", &error))
}

pub(crate) fn read_response<R: BufRead>(
    reader: &mut R,
    method: HttpMethod,
) -> BrowserResult<HttpResponse> {
    let status_line = read_line(reader, "status line")?;
    let (version, status, reason) = parse_status_line(&status_line)?;

    let mut headers = Vec::new();
    loop {
        let line = read_line(reader, "header line")?;
        if line.is_empty() {
            break;
        }
        if headers.len() == MAX_HEADER_COUNT {
            return Err(BrowserError::new(
                "net.http.too_many_headers",
                format!("response carries more than {MAX_HEADER_COUNT} headers"),
            ));
        }
        match line
            .split_once(':')
            .map(|(name, value)| Header::new(name.trim(), value.trim()))
        {
            Some(Ok(header)) => headers.push(header),
            _ => debug!("skipping malformed response header `{line}`"),
        }
    }

    let body = if method == HttpMethod::Head || status.forbids_body() {
        Vec::new()
    } else if let Some(encoding) = find_header(&headers, "transfer-encoding") {
        if !header_has_token(&headers, "transfer-encoding", "chunked") {
            return Err(BrowserError::new(
                "net.http.transfer_encoding_unsupported",
                format!("unsupported transfer encoding `{encoding}`"),
            ));
        }
        read_chunked_body(reader)?
    } else if let Some(length) = parse_content_length(&headers)? {
        read_sized_body(reader, length)?
    } else {
        read_until_close(reader)?
    };

    let body = decode_content_encoding(&headers, body)?;
    let reason = if reason.is_empty() {
        status.canonical_reason().to_owned()
    } else {
        reason
    };

    Ok(HttpResponse {
        version,
        status,
        reason,
        headers,
        body,
    })
}

/// Reads one CRLF- or LF-terminated line without its terminator.
fn read_line<R: BufRead>(reader: &mut R, context: &str) -> BrowserResult<String> {
    let mut line = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_BYTES as u64)
        .read_until(b'\n', &mut line)
        .map_err(|error| io_failure("net.http.read_failed", context, &error))?;

    if read == 0 {
        return Err(BrowserError::new(
            "net.http.unexpected_eof",
            format!("connection closed while reading {context}"),
        ));
    }
    if line.last() != Some(&b'\n') {
        if line.len() >= MAX_LINE_BYTES {
            return Err(BrowserError::new(
                "net.http.line_too_long",
                format!("{context} exceeds {MAX_LINE_BYTES} bytes"),
            ));
        }
        return Err(BrowserError::new(
            "net.http.unexpected_eof",
            format!("connection closed in the middle of {context}"),
        ));
    }

    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

fn parse_status_line(line: &str) -> BrowserResult<(HttpVersion, HttpStatusCode, String)> {
    let mut parts = line.splitn(3, ' ');
    let version = match parts.next() {
        Some("HTTP/1.1") => HttpVersion::Http11,
        Some("HTTP/1.0") => HttpVersion::Http10,
        _ => {
            return Err(BrowserError::new(
                "net.http.status_line_invalid",
                format!("unsupported status line `{line}`"),
            ));
        }
    };

    let code = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            BrowserError::new(
                "net.http.status_line_invalid",
                format!("missing status code in `{line}`"),
            )
        })?;
    let status = HttpStatusCode::new(code)?;
    let reason = parts.next().unwrap_or_default().trim().to_owned();

    Ok((version, status, reason))
}

fn parse_content_length(headers: &[Header]) -> BrowserResult<Option<usize>> {
    let mut length = None;
    for header in headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-length"))
    {
        let parsed = header.value.trim().parse::<usize>().map_err(|_| {
            BrowserError::new(
                "net.http.content_length_invalid",
                format!("invalid Content-Length `{}`", header.value),
            )
        })?;
        if length.is_some_and(|previous| previous != parsed) {
            return Err(BrowserError::new(
                "net.http.content_length_conflict",
                "conflicting Content-Length headers",
            ));
        }
        length = Some(parsed);
    }
    Ok(length)
}

fn read_sized_body<R: Read>(reader: &mut R, length: usize) -> BrowserResult<Vec<u8>> {
    if length > MAX_BODY_BYTES {
        return Err(body_too_large());
    }
    let mut body = vec![0_u8; length];
    reader
        .read_exact(&mut body)
        .map_err(|error| io_failure("net.http.body_truncated", "reading body", &error))?;
    Ok(body)
}

fn read_until_close<R: Read>(reader: &mut R) -> BrowserResult<Vec<u8>> {
    let mut body = Vec::new();
    reader
        .take(MAX_BODY_BYTES as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|error| io_failure("net.http.read_failed", "reading body", &error))?;
    if body.len() > MAX_BODY_BYTES {
        return Err(body_too_large());
    }
    Ok(body)
}

fn read_chunked_body<R: BufRead>(reader: &mut R) -> BrowserResult<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line = read_line(reader, "chunk size")?;
        let size_text = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_text, 16).map_err(|_| {
            BrowserError::new(
                "net.http.chunk_size_invalid",
                format!("invalid chunk size `{size_text}`"),
            )
        })?;

        if size == 0 {
            // Trailers are read and discarded.
            while !read_line(reader, "chunk trailer")?.is_empty() {}
            return Ok(body);
        }

        if body.len().saturating_add(size) > MAX_BODY_BYTES {
            return Err(body_too_large());
        }
        let start = body.len();
        body.resize(start + size, 0);
        reader
            .read_exact(&mut body[start..])
            .map_err(|error| io_failure("net.http.body_truncated", "reading chunk", &error))?;

        if !read_line(reader, "chunk terminator")?.is_empty() {
            return Err(BrowserError::new(
                "net.http.chunk_terminator_invalid",
                "chunk data not followed by CRLF",
            ));
        }
    }
}

fn decode_content_encoding(headers: &[Header], body: Vec<u8>) -> BrowserResult<Vec<u8>> {
    let encodings: Vec<String> = headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-encoding"))
        .flat_map(|header| header.value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut decoded = body;
    for encoding in encodings.iter().rev() {
        decoded = match encoding.as_str() {
            "identity" => decoded,
            "gzip" | "x-gzip" => inflate(GzDecoder::new(decoded.as_slice()), "gzip")?,
            "deflate" => {
                // Servers disagree on whether deflate means zlib-wrapped or raw.
                match inflate(ZlibDecoder::new(decoded.as_slice()), "deflate") {
                    Ok(inflated) => inflated,
                    Err(_) => inflate(DeflateDecoder::new(decoded.as_slice()), "deflate")?,
                }
            }
            "br" => inflate(Decompressor::new(decoded.as_slice(), 4096), "brotli")?,
            _ => {
                return Err(BrowserError::new(
                    "net.http.content_encoding_unsupported",
                    format!("unsupported content encoding `{encoding}`"),
                ));
            }
        };
    }
    Ok(decoded)
}

fn inflate<R: Read>(decoder: R, name: &str) -> BrowserResult<Vec<u8>> {
    let mut inflated = Vec::new();
    decoder
        .take(MAX_BODY_BYTES as u64 + 1)
        .read_to_end(&mut inflated)
        .map_err(|error| {
            BrowserError::new(
                "net.http.decode_failed",
                format!("{name} decode failed: {error}"),
            )
        })?;
    if inflated.len() > MAX_BODY_BYTES {
        return Err(body_too_large());
    }
    Ok(inflated)
}

fn body_too_large() -> BrowserError {
    BrowserError::new(
        "net.http.body_too_large",
        format!("response body exceeds {MAX_BODY_BYTES} bytes"),
    )
}
