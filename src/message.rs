//! Per-message summary records and their renderings

use serde::Serialize;
use std::fmt;

/// A single envelope address.
///
/// `name` is already decoded from any encoded-word form and is empty
/// when the server sent `NIL`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    pub name: String,
    pub mailbox: String,
    pub host: String,
}

impl Address {
    /// `true` when the server reported no address at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.mailbox.is_empty() && self.host.is_empty()
    }
}

/// Renders as `mailbox@host <name>`, or `-` for an absent address.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        write!(f, "{}@{} <{}>", self.mailbox, self.host, self.name)
    }
}

/// A named body part and its encoded size in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub size: u64,
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.name, self.size)
    }
}

/// The envelope fields printed for every message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeSummary {
    /// `INTERNALDATE` exactly as the server sent it.
    pub date: String,
    /// `RFC822.SIZE` in bytes.
    pub size: u64,
    pub from: Address,
    pub to: Address,
    /// Decoded subject with line breaks escaped as `\n`; `-` when absent.
    pub subject: String,
}

impl EnvelopeSummary {
    /// The `To/From/Subject/Date/Size` report line.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "To: {} From: {} Subject: {} {} Size:{}",
            self.to, self.from, self.subject, self.date, self.size
        )
    }
}

/// Everything extracted from one FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub envelope: EnvelopeSummary,
    pub attachments: Vec<Attachment>,
}

impl MessageSummary {
    /// The `<n> attaches: [...]` report line.
    #[must_use]
    pub fn attachment_line(&self) -> String {
        let list = self
            .attachments
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} attaches: [{list}]", self.attachments.len())
    }

    /// One-line JSON object tagged with the folder it came from.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` serialization failures.
    pub fn to_json_line(&self, folder: &str) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Record<'a> {
            folder: &'a str,
            #[serde(flatten)]
            envelope: &'a EnvelopeSummary,
            attachments: &'a [Attachment],
        }

        serde_json::to_string(&Record {
            folder,
            envelope: &self.envelope,
            attachments: &self.attachments,
        })
    }
}
