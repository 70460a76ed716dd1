//! Password acquisition
//!
//! The driver never reads a password from its configuration. It asks a
//! [`PasswordProvider`] exactly once, right before LOGIN.

use crate::error::{Error, Result};
use std::env;
use tracing::debug;

/// Source of the account password.
pub trait PasswordProvider {
    /// Return the password for `username`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no password is available.
    fn password(&self, username: &str) -> Result<String>;
}

/// A fixed password, handy for tests and embedding.
#[derive(Clone)]
pub struct StaticPassword(String);

impl StaticPassword {
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }
}

impl PasswordProvider for StaticPassword {
    fn password(&self, _username: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

impl std::fmt::Debug for StaticPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticPassword(***)")
    }
}

/// Reads the password from an environment variable (`IMAP_PASSWORD`
/// by default), honouring a `.env` file if present.
#[derive(Debug, Clone)]
pub struct EnvPassword {
    var: String,
}

impl EnvPassword {
    pub const DEFAULT_VAR: &'static str = "IMAP_PASSWORD";

    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvPassword {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

impl PasswordProvider for EnvPassword {
    fn password(&self, _username: &str) -> Result<String> {
        dotenvy::dotenv().ok();
        env::var(&self.var).map_err(|_| Error::Config(format!("{} not set", self.var)))
    }
}

/// Asks on the terminal without echoing the input.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptPassword;

#[cfg(feature = "cli")]
impl PasswordProvider for PromptPassword {
    fn password(&self, username: &str) -> Result<String> {
        Ok(rpassword::prompt_password(format!("Password for {username}: "))?)
    }
}

/// Tries `primary`, and asks `secondary` only when `primary` fails.
#[derive(Debug, Clone)]
pub struct Fallback<A, B> {
    primary: A,
    secondary: B,
}

impl<A, B> Fallback<A, B> {
    #[must_use]
    pub const fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<A: PasswordProvider, B: PasswordProvider> PasswordProvider for Fallback<A, B> {
    fn password(&self, username: &str) -> Result<String> {
        self.primary.password(username).or_else(|e| {
            debug!("Primary password source failed ({}), trying the next", e);
            self.secondary.password(username)
        })
    }
}

impl<F> PasswordProvider for F
where
    F: Fn(&str) -> Result<String>,
{
    fn password(&self, username: &str) -> Result<String> {
        self(username)
    }
}
