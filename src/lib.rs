//! Minimal IMAP4 summary client
//!
//! Connects to a mail server over a raw socket, optionally upgrades
//! with STARTTLS, logs in, enumerates folders and prints a one-line
//! envelope summary plus an attachment list for every selected
//! message. No IMAP library is involved: commands are written by hand
//! and responses are read by the small grammar in [`parser`].

mod client;
mod config;
mod connection;
mod credentials;
mod encoding;
mod error;
mod folder;
mod message;
pub mod parser;
mod value;

pub use client::{ImapClient, PLAINTEXT_WARNING, TAG};
pub use config::{
    DEFAULT_SERVER, ImapConfig, MessageSelector, OutputFormat, ServerAddress, TlsMode,
    TlsVerification,
};
pub use connection::{Connection, Frame, ImapStream, connect};
#[cfg(feature = "cli")]
pub use credentials::PromptPassword;
pub use credentials::{EnvPassword, Fallback, PasswordProvider, StaticPassword};
pub use encoding::decode_header;
pub use error::{Error, Result};
pub use folder::Folder;
pub use message::{Address, Attachment, EnvelopeSummary, MessageSummary};
