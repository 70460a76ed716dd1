//! IMAP connection configuration

use crate::error::{Error, Result};
use std::env;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::time::Duration;

/// Default server used when nothing else is configured.
pub const DEFAULT_SERVER: &str = "imap.mail.ru:143";

/// A `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    /// Parse a `host:port` string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] unless the input is exactly two
    /// colon-separated parts with a non-empty host and a numeric port.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let [host, port] = parts.as_slice() else {
            return Err(Error::Config(
                "Incorrect address (must be in \"server:port\" format)".into(),
            ));
        };
        if host.is_empty() {
            return Err(Error::Config(format!("Missing host in address '{s}'")));
        }
        let port = port
            .parse()
            .map_err(|e| Error::Config(format!("Invalid port '{port}': {e}")))?;

        Ok(Self {
            host: (*host).to_string(),
            port,
        })
    }
}

impl FromStr for ServerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Which messages of each folder get fetched.
///
/// Indices are zero-based positions within the folder; the driver
/// turns them into 1-based IMAP sequence numbers on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageSelector {
    /// Every message in the folder.
    #[default]
    All,
    /// The first `n` messages, clamped to the folder size.
    First(usize),
    /// An inclusive `[start, end]` window.
    Range { start: usize, end: usize },
}

impl MessageSelector {
    /// Build a selector from the raw bounds given on the command line:
    /// none means all, one means "first N", two mean an inclusive
    /// range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a negative bound, a reversed
    /// range, or more than two bounds.
    pub fn from_bounds(bounds: &[i64]) -> Result<Self> {
        match *bounds {
            [] => Ok(Self::All),
            [n] => Ok(Self::First(non_negative(n)?)),
            [a, b] => Self::range(non_negative(a)?, non_negative(b)?),
            _ => Err(Error::Config(
                "Incorrect letter interval (at most two bounds)".into(),
            )),
        }
    }

    /// An inclusive range selector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `start > end`.
    pub fn range(start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(Error::Config(format!(
                "Incorrect letter interval ({start} > {end})"
            )));
        }
        Ok(Self::Range { start, end })
    }

    /// The zero-based indices to fetch from a folder holding `total`
    /// messages.
    ///
    /// An explicit range is not clamped: fetching stops on its own
    /// once the server reports that nothing matched.
    #[must_use]
    pub fn resolve(self, total: usize) -> Range<usize> {
        match self {
            Self::All => 0..total,
            Self::First(n) => 0..n.min(total),
            Self::Range { start, end } => start..end.saturating_add(1),
        }
    }
}

fn non_negative(bound: i64) -> Result<usize> {
    usize::try_from(bound)
        .map_err(|_| Error::Config(format!("Incorrect letter interval (negative bound {bound})")))
}

/// Whether the plaintext session is upgraded before LOGIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Issue STARTTLS and wrap the socket before sending credentials.
    StartTls,
    /// Stay on plaintext. A warning is printed once per session.
    Plain,
}

/// How the server certificate is checked after STARTTLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVerification {
    /// Verify against the bundled Mozilla trust anchors.
    #[default]
    WebPki,
    /// Accept any certificate (self-signed bridges, test servers).
    AcceptAny,
}

/// Shape of the per-message report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Folder headers, one summary line and one attachment line per
    /// message, blank line after each folder.
    #[default]
    Text,
    /// One JSON object per message, one per line.
    Json,
}

/// Everything the session driver needs apart from the password.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub address: ServerAddress,
    pub tls: TlsMode,
    pub verification: TlsVerification,
    pub username: String,
    pub selector: MessageSelector,
    /// Idle time after which a response is considered complete.
    pub read_timeout: Duration,
    /// Upper bound on the STARTTLS handshake.
    pub handshake_timeout: Duration,
    /// How many SELECT commands are sent before giving up on a folder
    /// that never reports its message count.
    pub select_attempts: u32,
    pub format: OutputFormat,
}

impl ImapConfig {
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_SELECT_ATTEMPTS: u32 = 5;

    /// A STARTTLS configuration fetching every message.
    #[must_use]
    pub fn new(address: ServerAddress, username: impl Into<String>) -> Self {
        Self {
            address,
            tls: TlsMode::StartTls,
            verification: TlsVerification::default(),
            username: username.into(),
            selector: MessageSelector::All,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
            handshake_timeout: Self::DEFAULT_HANDSHAKE_TIMEOUT,
            select_attempts: Self::DEFAULT_SELECT_ATTEMPTS,
            format: OutputFormat::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USERNAME`
    ///
    /// Optional (with defaults):
    /// - `IMAP_SERVER` (default: `imap.mail.ru:143`)
    /// - `IMAP_SSL` (default: off; `1` or `true` enables STARTTLS)
    /// - `IMAP_INSECURE` (default: off; accept any certificate)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `IMAP_USERNAME` is missing or
    /// `IMAP_SERVER` is malformed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let username = env::var("IMAP_USERNAME")
            .map_err(|_| Error::Config("IMAP_USERNAME not set".into()))?;
        Self::from_env_for(username)
    }

    /// Like [`ImapConfig::from_env`], with the user name given by the
    /// caller instead of `IMAP_USERNAME`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `IMAP_SERVER` is malformed.
    pub fn from_env_for(username: impl Into<String>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let address = ServerAddress::parse(
            &env::var("IMAP_SERVER").unwrap_or_else(|_| DEFAULT_SERVER.to_string()),
        )?;

        let mut config = Self::new(address, username);
        config.tls = if env_flag("IMAP_SSL") {
            TlsMode::StartTls
        } else {
            TlsMode::Plain
        };
        if env_flag("IMAP_INSECURE") {
            config.verification = TlsVerification::AcceptAny;
        }
        Ok(config)
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}
