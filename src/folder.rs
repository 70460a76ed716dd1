//! IMAP folder names
//!
//! A [`Folder`] is the mailbox name taken from a LIST response. It
//! knows how to render itself as a SELECT argument: names that are
//! valid IMAP atoms go out verbatim, anything else as a quoted string.

use std::fmt;

/// An IMAP mailbox folder as reported by the server.
///
/// # Examples
///
/// ```
/// use imap_summary::Folder;
///
/// let inbox = Folder::new("INBOX");
/// assert_eq!(inbox.as_str(), "INBOX");
/// assert_eq!(inbox.to_command_arg(), "INBOX");
///
/// let nested = Folder::new("Work Projects");
/// assert_eq!(nested.to_command_arg(), "\"Work Projects\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Folder(String);

impl Folder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The folder name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as it should appear in a command line.
    #[must_use]
    pub fn to_command_arg(&self) -> String {
        astring(&self.0)
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Folder {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Folder {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Render `s` as an IMAP astring: an atom when every character is
/// allowed in one, otherwise a quoted string with `"` and `\` escaped.
pub(crate) fn astring(s: &str) -> String {
    let is_atom = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_graphic() && !matches!(c, '(' | ')' | '{' | '"' | '\\' | '%' | '*')
        });
    if is_atom {
        return s.to_string();
    }

    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
