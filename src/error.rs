//! Error types for imap-summary

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed server address or message selector. Raised before any
    /// network I/O happens.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to connect server: {0}")]
    Connect(String),

    /// The server rejected LOGIN. Carries the server's own text.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A FETCH response did not match the expected grammar. Carries the
    /// reason and the offending raw text.
    #[error("Parse error: {reason} in {raw:?}")]
    Parse { reason: String, raw: String },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(reason: impl Into<String>, raw: &str) -> Self {
        Self::Parse {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
