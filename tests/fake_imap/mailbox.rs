//! Test data model for the fake IMAP server
//!
//! Provides a builder-style API for constructing mailbox state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .folder("INBOX")
//!         .message(TestMessage::new("alice@example.com", "bob@example.com", "Hi"))
//!     .folder("Sent")
//!     .password("testpass")
//!     .build();
//! ```
//!
//! Each `TestMessage` renders itself as the attribute list of a
//! `FETCH <n> (FLAGS FULL)` response: INTERNALDATE, RFC822.SIZE,
//! ENVELOPE and BODY.

/// A complete mailbox: named folders plus a few knobs that make the
/// server misbehave on purpose.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
    /// Password LOGIN must present. `None` accepts anything.
    pub password: Option<String>,
    /// Number of SELECT replies per connection that omit `EXISTS`.
    pub select_noise: usize,
}

impl Mailbox {
    /// Look up a folder by name (case-sensitive, matching real IMAP).
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }
}

/// A single IMAP folder (e.g. "INBOX", "Sent", "Trash").
#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    /// `\Noselect` folders show up in LIST but cannot be selected.
    pub selectable: bool,
    pub messages: Vec<TestMessage>,
}

/// One envelope address: optional display name, `mailbox@host`.
#[derive(Debug, Clone)]
pub struct TestAddress {
    pub name: Option<String>,
    pub mailbox: String,
    pub host: String,
}

impl TestAddress {
    fn parse(addr: &str) -> Self {
        let (mailbox, host) = addr.split_once('@').expect("address needs an @");
        Self {
            name: None,
            mailbox: mailbox.to_string(),
            host: host.to_string(),
        }
    }

    fn render(&self) -> String {
        let name = self.name.as_deref().map_or_else(|| "NIL".to_string(), quote);
        format!(
            "(({name} NIL {} {}))",
            quote(&self.mailbox),
            quote(&self.host)
        )
    }
}

/// A test message as the server describes it in a FETCH FULL reply.
///
/// - `date`: INTERNALDATE string.
/// - `size`: RFC822.SIZE.
/// - `subject`: `None` renders as `NIL`.
/// - `attachments`: `(name, size)` pairs, each rendered as a base64
///   `application/octet-stream` part with a `name` parameter.
#[derive(Debug, Clone)]
pub struct TestMessage {
    pub date: String,
    pub size: u64,
    pub subject: Option<String>,
    pub from: TestAddress,
    pub to: TestAddress,
    pub attachments: Vec<(String, u64)>,
    /// Replaces the whole rendered attribute list when set.
    pub raw: Option<String>,
}

impl TestMessage {
    pub fn new(from: &str, to: &str, subject: &str) -> Self {
        Self {
            date: "01-Jan-2024 12:00:00 +0000".to_string(),
            size: 1024,
            subject: Some(subject.to_string()),
            from: TestAddress::parse(from),
            to: TestAddress::parse(to),
            attachments: Vec::new(),
            raw: None,
        }
    }

    /// A message whose FETCH reply is `items` verbatim.
    pub fn raw(items: &str) -> Self {
        let mut msg = Self::new("x@y", "x@y", "");
        msg.raw = Some(items.to_string());
        msg
    }

    pub fn from_name(mut self, name: &str) -> Self {
        self.from.name = Some(name.to_string());
        self
    }

    pub fn to_name(mut self, name: &str) -> Self {
        self.to.name = Some(name.to_string());
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.date = date.to_string();
        self
    }

    pub const fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn no_subject(mut self) -> Self {
        self.subject = None;
        self
    }

    pub fn attachment(mut self, name: &str, size: u64) -> Self {
        self.attachments.push((name.to_string(), size));
        self
    }

    /// The attribute list after `FLAGS (...)` in a FETCH reply.
    pub fn fetch_items(&self, seq: usize) -> String {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }

        let subject = self
            .subject
            .as_deref()
            .map_or_else(|| "NIL".to_string(), quote);
        let from = self.from.render();
        let to = self.to.render();
        let envelope = format!(
            "(\"Mon, 1 Jan 2024 12:00:00 +0000\" {subject} {from} {from} {from} {to} \
             NIL NIL NIL \"<msg-{seq}@fake.test>\")"
        );

        let text_part = "(\"text\" \"plain\" (\"charset\" \"utf-8\") NIL NIL \"7bit\" 42 2)";
        let body = if self.attachments.is_empty() {
            text_part.to_string()
        } else {
            let parts: String = self
                .attachments
                .iter()
                .map(|(name, size)| {
                    format!(
                        "(\"application\" \"octet-stream\" (\"name\" {}) NIL NIL \"base64\" {size})",
                        quote(name)
                    )
                })
                .collect();
            format!("({text_part}{parts} \"mixed\")")
        };

        format!(
            "INTERNALDATE {} RFC822.SIZE {} ENVELOPE {envelope} BODY {body}",
            quote(&self.date),
            self.size
        )
    }
}

/// Render an IMAP quoted string.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Builder for constructing a `Mailbox` step by step.
///
/// Call `.folder(name)` to start a new folder, then chain
/// `.message(...)` calls to add messages to it.
/// Finish with `.build()` to get the final `Mailbox`.
pub struct MailboxBuilder {
    mailbox: Mailbox,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            mailbox: Mailbox::default(),
        }
    }

    /// Add a new folder. Subsequent `.message()` calls add to this folder.
    pub fn folder(mut self, name: &str) -> Self {
        self.mailbox.folders.push(Folder {
            name: name.to_string(),
            selectable: true,
            messages: Vec::new(),
        });
        self
    }

    /// Add a `\Noselect` folder.
    pub fn noselect_folder(mut self, name: &str) -> Self {
        self.mailbox.folders.push(Folder {
            name: name.to_string(),
            selectable: false,
            messages: Vec::new(),
        });
        self
    }

    /// Add a message to the most recently added folder.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn message(mut self, message: TestMessage) -> Self {
        self.mailbox
            .folders
            .last_mut()
            .expect("call .folder() before .message()")
            .messages
            .push(message);
        self
    }

    /// Require this password on LOGIN.
    pub fn password(mut self, password: &str) -> Self {
        self.mailbox.password = Some(password.to_string());
        self
    }

    /// Answer the first `n` SELECTs of each connection without EXISTS.
    pub const fn select_noise(mut self, n: usize) -> Self {
        self.mailbox.select_noise = n;
        self
    }

    /// Consume the builder and return the finished `Mailbox`.
    pub fn build(self) -> Mailbox {
        self.mailbox
    }
}
