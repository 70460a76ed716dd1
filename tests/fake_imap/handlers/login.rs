//! LOGIN command handler.
//!
//! Credentials arrive as two astrings: bare atoms or quoted strings
//! with `\"` and `\\` escapes. When the mailbox has a password set,
//! LOGIN must present it; otherwise anything is accepted.

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Pull `(user, password)` out of a raw `tag LOGIN user password` line.
pub fn credentials(line: &str) -> Option<(String, String)> {
    let mut rest = line.trim_end();
    let mut tokens = Vec::new();
    while !rest.is_empty() {
        rest = rest.trim_start();
        let (token, tail) = if let Some(quoted) = rest.strip_prefix('"') {
            let mut out = String::new();
            let mut chars = quoted.char_indices();
            let end = loop {
                match chars.next()? {
                    (i, '"') => break i + 1,
                    (_, '\\') => out.push(chars.next()?.1),
                    (_, c) => out.push(c),
                }
            };
            (out, &quoted[end..])
        } else {
            let end = rest.find(' ').unwrap_or(rest.len());
            (rest[..end].to_string(), &rest[end..])
        };
        tokens.push(token);
        rest = tail;
    }

    match tokens.as_slice() {
        [_tag, cmd, user, pass] if cmd.eq_ignore_ascii_case("LOGIN") => {
            Some((user.clone(), pass.clone()))
        }
        _ => None,
    }
}

/// Handle the LOGIN command. Returns `true` when the client is now
/// authenticated.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    line: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> bool {
    let accepted = match (&mailbox.password, credentials(line)) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(expected), Some((_, given))) => *expected == given,
    };

    let resp = if accepted {
        format!("{tag} OK LOGIN completed\r\n")
    } else {
        format!("{tag} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
    };
    let _ = write_line(stream, &resp).await;
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use tokio::io::BufReader;

    /// Create a `BufReader` over an in-memory duplex stream, run the
    /// handler, and return what was written to the client.
    async fn run(line: &str, mailbox: &Mailbox) -> (String, bool) {
        let (client, server) = tokio::io::duplex(1024);
        let mut stream = BufReader::new(server);

        let ok = handle_login("A001", line, mailbox, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        (String::from_utf8(buf).unwrap(), ok)
    }

    #[test]
    fn parses_atoms_and_quoted_strings() {
        assert_eq!(
            credentials("A001 LOGIN user pass\r\n"),
            Some(("user".into(), "pass".into()))
        );
        assert_eq!(
            credentials("A001 LOGIN \"a b\" \"p\\\"w\\\\d\"\r\n"),
            Some(("a b".into(), "p\"w\\d".into()))
        );
        assert_eq!(credentials("A001 LOGIN onlyuser\r\n"), None);
        assert_eq!(credentials("A001 LIST \"\" *\r\n"), None);
    }

    #[tokio::test]
    async fn accepts_anything_without_password() {
        let mailbox = MailboxBuilder::new().build();
        let (output, ok) = run("A001 LOGIN who ever\r\n", &mailbox).await;
        assert!(ok);
        assert_eq!(output, "A001 OK LOGIN completed\r\n");
    }

    #[tokio::test]
    async fn checks_password_when_set() {
        let mailbox = MailboxBuilder::new().password("secret").build();

        let (_, ok) = run("A001 LOGIN user secret\r\n", &mailbox).await;
        assert!(ok);

        let (output, ok) = run("A001 LOGIN user wrong\r\n", &mailbox).await;
        assert!(!ok);
        assert!(output.starts_with("A001 NO [AUTHENTICATIONFAILED]"));
    }
}
