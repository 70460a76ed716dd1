//! Socket ownership, response framing and the STARTTLS upgrade
//!
//! Provides the low-level `connect()` used by [`crate::ImapClient`] and
//! the [`Connection`] it drives for the rest of the session.

use crate::config::{ServerAddress, TlsVerification};
use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

const READ_CHUNK: usize = 4096;

/// A stream that is either plaintext or TLS.
pub enum ImapStream {
    Plain(TcpStream),
    /// Boxed to keep the enum small.
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Where a response ends.
///
/// The protocol has no length prefix at this level, so a response is
/// complete once its closing line has arrived. Whatever the frame, a
/// read that stays idle for the read timeout or hits end of stream
/// also ends the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'t> {
    /// A single line, such as the server greeting.
    Line,
    /// Everything up to and including the completion line for the tag.
    Tagged(&'t str),
}

impl Frame<'_> {
    fn is_complete(self, data: &[u8]) -> bool {
        let Some(body) = data.strip_suffix(b"\n") else {
            return false;
        };
        match self {
            Self::Line => true,
            Self::Tagged(tag) => {
                let start = body.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
                let last = &body[start..];
                last.starts_with(tag.as_bytes()) && last.get(tag.len()) == Some(&b' ')
            }
        }
    }
}

/// The open session socket. Dropping it closes the connection.
pub struct Connection {
    stream: ImapStream,
    host: String,
    read_timeout: Duration,
}

impl Connection {
    /// Wrap an already-connected stream.
    #[must_use]
    pub fn new(stream: ImapStream, host: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            stream,
            host: host.into(),
            read_timeout,
        }
    }

    /// Send one command line. The CRLF terminator is appended here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the write fails.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Collect one response.
    ///
    /// Returns an empty string if nothing arrived before the read
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the read fails.
    pub async fn read_response(&mut self, frame: Frame<'_>) -> Result<String> {
        let mut data = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            match tokio::time::timeout(self.read_timeout, self.stream.read(&mut chunk)).await {
                // Idle or closed.
                Err(_) | Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    data.extend_from_slice(&chunk[..n]);
                    if frame.is_complete(&data) {
                        break;
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }

        Ok(response_text(&data))
    }

    /// Wrap the socket in TLS. STARTTLS must already have been
    /// acknowledged by the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the stream is already encrypted, the
    /// host is not a valid server name, or the handshake fails or does
    /// not finish within `handshake_timeout`.
    pub async fn upgrade_tls(
        self,
        verification: TlsVerification,
        handshake_timeout: Duration,
    ) -> Result<Self> {
        let Self {
            stream,
            host,
            read_timeout,
        } = self;

        let ImapStream::Plain(tcp) = stream else {
            return Err(Error::Tls("Stream is already TLS".into()));
        };

        let connector = tls_connector(verification)?;
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;
        let tls = tokio::time::timeout(handshake_timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| {
                Error::Tls(format!(
                    "Handshake with {host} timed out after {handshake_timeout:?}"
                ))
            })?
            .map_err(|e| Error::Tls(e.to_string()))?;

        info!("TLS established with {}", host);
        Ok(Self::new(ImapStream::Tls(Box::new(tls)), host, read_timeout))
    }

    /// Best-effort close of the write half.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Shutdown failed: {}", e);
        }
    }
}

/// Decode a raw response as lossy UTF-8.
///
/// Literal sizes count raw bytes, and lossy decoding can change the
/// length of 8-bit payloads, so every `{n}` header is rewritten with
/// the decoded length of the payload that follows it.
fn response_text(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some((open, start, len)) = next_literal(rest) {
        let end = start.saturating_add(len).min(rest.len());
        out.push_str(&String::from_utf8_lossy(&rest[..open]));
        let payload = String::from_utf8_lossy(&rest[start..end]);
        out.push_str(&format!("{{{}}}\r\n", payload.len()));
        out.push_str(&payload);
        rest = &rest[end..];
    }

    out.push_str(&String::from_utf8_lossy(rest));
    out
}

/// The first `{n}` (or `{n+}`) header followed by a line break:
/// `(offset of '{', offset of the payload, n)`.
fn next_literal(buf: &[u8]) -> Option<(usize, usize, usize)> {
    let mut from = 0;
    while let Some(offset) = buf[from..].iter().position(|&b| b == b'{') {
        let open = from + offset;
        if let Some(found) = literal_at(buf, open) {
            return Some(found);
        }
        from = open + 1;
    }
    None
}

fn literal_at(buf: &[u8], open: usize) -> Option<(usize, usize, usize)> {
    let digits = buf[open + 1..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let digits_end = open + 1 + digits;
    let len: usize = std::str::from_utf8(&buf[open + 1..digits_end]).ok()?.parse().ok()?;

    let mut pos = digits_end;
    if buf.get(pos) == Some(&b'+') {
        pos += 1;
    }
    if buf.get(pos) != Some(&b'}') {
        return None;
    }
    pos += 1;

    let start = if buf[pos..].starts_with(b"\r\n") {
        pos + 2
    } else if buf[pos..].starts_with(b"\n") {
        pos + 1
    } else {
        return None;
    };
    Some((open, start, len))
}

/// Open a TCP connection and consume the server greeting.
///
/// # Errors
///
/// Returns [`Error::Connect`] if the host does not resolve, refuses the
/// connection or greets with `BYE`, and [`Error::Protocol`] if no
/// greeting arrives within `read_timeout`.
pub async fn connect(address: &ServerAddress, read_timeout: Duration) -> Result<Connection> {
    debug!("Connecting to IMAP server at {}", address);

    let tcp = TcpStream::connect((address.host.as_str(), address.port))
        .await
        .map_err(|e| Error::Connect(format!("{address}: {e}")))?;
    let mut conn = Connection::new(ImapStream::Plain(tcp), address.host.clone(), read_timeout);

    let greeting = conn.read_response(Frame::Line).await?;
    if greeting.is_empty() {
        return Err(Error::Protocol("Failed to get response from server".into()));
    }
    if greeting.starts_with("* BYE") {
        return Err(Error::Connect(format!(
            "{address} refused the session: {}",
            greeting.trim_end()
        )));
    }

    debug!("Greeting: {}", greeting.trim_end());
    Ok(conn)
}

/// Build a TLS connector on the `ring` provider.
fn tls_connector(verification: TlsVerification) -> Result<TlsConnector> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?;

    let config = match verification {
        TlsVerification::WebPki => {
            let roots = rustls::RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        TlsVerification::AcceptAny => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
            .with_no_client_auth(),
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Certificate verifier that accepts every certificate (self-signed
/// bridges and test servers).
#[derive(Debug)]
struct AcceptAnyCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
