//! IMAP session driver

use crate::config::{ImapConfig, OutputFormat, TlsMode};
use crate::connection::{self, Connection, Frame};
use crate::credentials::PasswordProvider;
use crate::error::{Error, Result};
use crate::folder::{Folder, astring};
use crate::message::MessageSummary;
use crate::parser::{
    Completion, Status, completion, has_fetch_data, parse_folder_list, parse_message,
    parse_message_count,
};
use std::io::Write;
use tracing::{debug, info, warn};

/// Tag prefixed to every command. Commands are strictly sequential, so
/// one tag is enough to find each completion line.
pub const TAG: &str = "A001";

/// Printed once when the session stays on plaintext.
pub const PLAINTEXT_WARNING: &str =
    "WARNING! You are in open connection, so your data could be compromised!";

/// Read-only IMAP client that prints a summary of every folder.
pub struct ImapClient<P> {
    config: ImapConfig,
    passwords: P,
}

impl<P: PasswordProvider> ImapClient<P> {
    #[must_use]
    pub const fn new(config: ImapConfig, passwords: P) -> Self {
        Self { config, passwords }
    }

    /// Run the whole session, writing the report to `out` as it is
    /// produced.
    ///
    /// Connects, secures or warns, logs in, lists folders and then
    /// selects and fetches each folder in server order.
    ///
    /// # Errors
    ///
    /// Returns the first connection, TLS, authentication or protocol
    /// failure. Messages whose FETCH response cannot be parsed are
    /// skipped, not fatal.
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut conn = self.connect().await?;

        conn = match self.config.tls {
            TlsMode::StartTls => self.upgrade_tls(conn).await?,
            TlsMode::Plain => {
                warn!("Continuing without TLS");
                emit(out, PLAINTEXT_WARNING)?;
                conn
            }
        };

        self.login(&mut conn).await?;

        let folders = Self::list_folders(&mut conn).await?;
        info!("Found {} folders", folders.len());

        for folder in &folders {
            self.select_and_fetch(&mut conn, folder, out).await?;
        }

        Self::logout(&mut conn).await;
        Ok(())
    }

    /// Open the socket and read the greeting.
    ///
    /// # Errors
    ///
    /// See [`connection::connect`].
    pub async fn connect(&self) -> Result<Connection> {
        connection::connect(&self.config.address, self.config.read_timeout).await
    }

    /// Issue STARTTLS and wrap the socket. The server's reply is only
    /// logged; a refusal surfaces as a failed handshake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Tls`].
    pub async fn upgrade_tls(&self, mut conn: Connection) -> Result<Connection> {
        conn.send(&format!("{TAG} STARTTLS")).await?;
        let response = conn.read_response(Frame::Tagged(TAG)).await?;
        debug!("STARTTLS response: {}", response.trim_end());

        conn.upgrade_tls(self.config.verification, self.config.handshake_timeout)
            .await
    }

    /// Authenticate with the configured user and the provider's
    /// password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] with the server's text when LOGIN is
    /// rejected, [`Error::Protocol`] when no completion arrives.
    pub async fn login(&self, conn: &mut Connection) -> Result<()> {
        let username = &self.config.username;
        let password = self.passwords.password(username)?;

        debug!("Logging in as {}", username);
        conn.send(&format!(
            "{TAG} LOGIN {} {}",
            astring(username),
            astring(&password)
        ))
        .await?;
        let response = conn.read_response(Frame::Tagged(TAG)).await?;

        match completion(&response, TAG) {
            Some(Completion {
                status: Status::Ok, ..
            }) => {
                info!("Logged in as {}", username);
                Ok(())
            }
            Some(Completion { text, .. }) => Err(Error::Auth(text.to_string())),
            None => Err(Error::Protocol(format!(
                "No reply to LOGIN: {:?}",
                response.trim_end()
            ))),
        }
    }

    /// `LIST "" *`, in server order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the server rejects LIST.
    pub async fn list_folders(conn: &mut Connection) -> Result<Vec<Folder>> {
        conn.send(&format!("{TAG} LIST \"\" *")).await?;
        let response = conn.read_response(Frame::Tagged(TAG)).await?;

        if let Some(Completion {
            status: Status::No | Status::Bad,
            text,
        }) = completion(&response, TAG)
        {
            return Err(Error::Protocol(format!("List folders failed: {text}")));
        }

        Ok(parse_folder_list(&response))
    }

    /// Select `folder`, then fetch and print the messages the selector
    /// picks out of it.
    ///
    /// Stops early once a FETCH comes back empty or reports that
    /// nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if SELECT never reports a message
    /// count, or an I/O error from the socket or `out`.
    pub async fn select_and_fetch<W: Write>(
        &self,
        conn: &mut Connection,
        folder: &Folder,
        out: &mut W,
    ) -> Result<()> {
        let total = self.select(conn, folder).await?;
        info!("{} holds {} messages", folder, total);

        if self.config.format == OutputFormat::Text {
            emit(out, &format!("{folder} FOLDER"))?;
        }

        for index in self.config.selector.resolve(total) {
            let seq = index + 1;
            conn.send(&format!("{TAG} FETCH {seq} (FLAGS FULL)")).await?;
            let response = conn.read_response(Frame::Tagged(TAG)).await?;

            let nothing_matched = completion(&response, TAG)
                .is_some_and(|c| c.text.contains("nothing matched"));
            if nothing_matched || !has_fetch_data(&response) {
                debug!("No message {} in {}, stopping", seq, folder);
                break;
            }

            match parse_message(&response) {
                Ok(message) => self.report(out, folder, &message)?,
                Err(e) => warn!("Skipping message {} in {}: {}", seq, folder, e),
            }
        }

        if self.config.format == OutputFormat::Text {
            emit(out, "")?;
        }
        Ok(())
    }

    /// Send SELECT until the response carries an EXISTS count, at most
    /// `select_attempts` times.
    async fn select(&self, conn: &mut Connection, folder: &Folder) -> Result<usize> {
        let command = format!("{TAG} SELECT {}", folder.to_command_arg());

        for attempt in 1..=self.config.select_attempts {
            conn.send(&command).await?;
            let response = conn.read_response(Frame::Tagged(TAG)).await?;

            match parse_message_count(&response) {
                Ok(total) => return Ok(total),
                Err(e) => debug!("SELECT {} attempt {}: {}", folder, attempt, e),
            }
        }

        Err(Error::Protocol(format!(
            "Failed to select {folder}: no message count after {} attempts",
            self.config.select_attempts
        )))
    }

    fn report<W: Write>(
        &self,
        out: &mut W,
        folder: &Folder,
        message: &MessageSummary,
    ) -> Result<()> {
        match self.config.format {
            OutputFormat::Text => {
                emit(out, &message.envelope.summary_line())?;
                emit(out, &message.attachment_line())
            }
            OutputFormat::Json => {
                let line = message
                    .to_json_line(folder.as_str())
                    .map_err(|e| Error::Io(std::io::Error::other(e)))?;
                emit(out, &line)
            }
        }
    }

    async fn logout(conn: &mut Connection) {
        if conn.send(&format!("{TAG} LOGOUT")).await.is_ok() {
            conn.read_response(Frame::Tagged(TAG)).await.ok();
        }
        conn.shutdown().await;
    }
}

fn emit<W: Write>(out: &mut W, line: &str) -> Result<()> {
    writeln!(out, "{line}")?;
    out.flush()?;
    Ok(())
}
