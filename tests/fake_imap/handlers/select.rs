//! SELECT command handler.
//!
//! Opens a folder and responds with metadata. The key piece is
//! `* N EXISTS`, the total number of messages in the folder.
//!
//! While `noise` is non-zero the reply leaves EXISTS out, the way a
//! busy server occasionally does, and the counter is decremented.
//!
//! Returns the selected folder name (or `None` if not selectable).

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle the SELECT command. Returns the selected folder name.
pub async fn handle_select<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    folder_name: &str,
    mailbox: &Mailbox,
    noise: &mut usize,
    stream: &mut BufReader<S>,
) -> Option<String> {
    let Some(folder) = mailbox.get_folder(folder_name).filter(|f| f.selectable) else {
        let resp = format!("{tag} NO Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return None;
    };

    // RFC 3501 Section 6.3.1: required FLAGS response
    let _ = write_line(
        stream,
        "* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)\r\n",
    )
    .await;

    if *noise > 0 {
        *noise -= 1;
    } else {
        let exists = format!("* {} EXISTS\r\n", folder.messages.len());
        let _ = write_line(stream, &exists).await;
    }

    let _ = write_line(stream, "* 0 RECENT\r\n").await;
    let _ = write_line(stream, "* OK [UIDVALIDITY 1]\r\n").await;

    let resp = format!("{tag} OK [READ-ONLY] SELECT completed\r\n");
    let _ = write_line(stream, &resp).await;
    Some(folder_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::{MailboxBuilder, TestMessage};
    use tokio::io::BufReader;

    async fn run(
        folder_name: &str,
        mailbox: &Mailbox,
        noise: &mut usize,
    ) -> (String, Option<String>) {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);

        let selected = handle_select("A1", folder_name, mailbox, noise, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        (String::from_utf8(buf).unwrap(), selected)
    }

    fn msg() -> TestMessage {
        TestMessage::new("a@b.com", "c@d.com", "Test")
    }

    #[tokio::test]
    async fn selects_existing_folder() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .message(msg())
            .message(msg())
            .build();

        let (output, selected) = run("INBOX", &mailbox, &mut 0).await;

        assert_eq!(selected, Some("INBOX".to_string()));
        assert!(output.contains("* 2 EXISTS"));
        assert!(output.ends_with("A1 OK [READ-ONLY] SELECT completed\r\n"));
    }

    #[tokio::test]
    async fn returns_none_for_missing_or_noselect_folder() {
        let mailbox = MailboxBuilder::new().noselect_folder("[Gmail]").build();

        let (output, selected) = run("NoSuchFolder", &mailbox, &mut 0).await;
        assert!(selected.is_none());
        assert!(output.contains("A1 NO Folder not found"));

        let (_, selected) = run("[Gmail]", &mailbox, &mut 0).await;
        assert!(selected.is_none());
    }

    #[tokio::test]
    async fn noise_drops_exists_until_spent() {
        let mailbox = MailboxBuilder::new().folder("INBOX").message(msg()).build();
        let mut noise = 1;

        let (output, _) = run("INBOX", &mailbox, &mut noise).await;
        assert!(!output.contains("EXISTS"));
        assert_eq!(noise, 0);

        let (output, _) = run("INBOX", &mailbox, &mut noise).await;
        assert!(output.contains("* 1 EXISTS"));
    }
}
