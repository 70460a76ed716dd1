//! Extraction of folders, counts and message metadata from raw server
//! responses
//!
//! Every function takes the complete text of one response. The grammar
//! understood here is the subset a `FETCH <n> (FLAGS FULL)` exchange
//! produces:
//!
//! ```text
//! * 1 FETCH (FLAGS (\Seen) INTERNALDATE "17-Jul-1996 02:44:25 -0700"
//!   RFC822.SIZE 4286 ENVELOPE (date subject from sender reply-to to
//!   cc bcc in-reply-to message-id) BODY (...))
//! ```
//!
//! Attributes are looked up by name, so their order does not matter.
//! Envelope fields are positional as RFC 3501 section 7.4.2 defines
//! them.

use crate::encoding::decode_header;
use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::message::{Address, Attachment, EnvelopeSummary, MessageSummary};
use crate::value::{Reader, Value};
use tracing::debug;

/// Status word of a tagged completion line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
}

/// The tagged line that closes a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<'a> {
    pub status: Status,
    /// Everything after the status word.
    pub text: &'a str,
}

/// Find the completion line for `tag`, if the response has one.
#[must_use]
pub fn completion<'a>(text: &'a str, tag: &str) -> Option<Completion<'a>> {
    text.lines().rev().find_map(|line| {
        let rest = line.strip_prefix(tag)?.strip_prefix(' ')?;
        let (word, text) = rest.split_once(' ').unwrap_or((rest, ""));
        let status = match word.to_ascii_uppercase().as_str() {
            "OK" => Status::Ok,
            "NO" => Status::No,
            "BAD" => Status::Bad,
            _ => return None,
        };
        Some(Completion {
            status,
            text: text.trim_end(),
        })
    })
}

/// Folder names from a `LIST "" *` response, in server order.
///
/// Status lines are ignored. Entries without a hierarchy delimiter
/// (`NIL`), entries that cannot be selected and malformed lines are
/// skipped.
#[must_use]
pub fn parse_folder_list(text: &str) -> Vec<Folder> {
    let mut reader = Reader::new(text);
    let mut folders = Vec::new();

    while !reader.is_eof() {
        if reader.eat("* LIST ") {
            match list_entry(&mut reader) {
                Ok(Some(folder)) => folders.push(folder),
                Ok(None) => {}
                Err(reason) => debug!("Skipping malformed LIST line: {}", reason),
            }
        }
        reader.skip_line();
    }

    folders
}

fn list_entry(reader: &mut Reader<'_>) -> std::result::Result<Option<Folder>, String> {
    let flags = reader.read_value()?;
    let flags = flags.as_list().ok_or("mailbox flags are not a list")?;
    let delimiter = reader.read_value()?;
    let name = reader.read_value()?;
    let name = name.as_str().ok_or("mailbox name is not a string")?;

    if delimiter.as_str().is_none_or(str::is_empty) {
        debug!("Skipping folder without delimiter: {}", name);
        return Ok(None);
    }
    if flags
        .iter()
        .any(|f| f.is_atom("\\Noselect") || f.is_atom("\\NonExistent"))
    {
        debug!("Skipping unselectable folder: {}", name);
        return Ok(None);
    }

    Ok(Some(Folder::new(name)))
}

/// Message count from the `* <n> EXISTS` line of a SELECT response.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if no such line is present, which the
/// driver answers by re-sending SELECT.
pub fn parse_message_count(text: &str) -> Result<usize> {
    text.lines()
        .find_map(|line| {
            let mut tokens = line.split_whitespace();
            if tokens.next() != Some("*") {
                return None;
            }
            let count = tokens.next()?;
            tokens
                .next()
                .filter(|kw| kw.eq_ignore_ascii_case("EXISTS"))?;
            count.parse().ok()
        })
        .ok_or_else(|| Error::Protocol(format!("SELECT response has no EXISTS line: {text:?}")))
}

/// `true` when a FETCH response carries message data at all.
#[must_use]
pub fn has_fetch_data(text: &str) -> bool {
    text.contains(" FETCH (")
}

/// Date, size, addresses and subject of a FETCH response.
///
/// # Errors
///
/// Returns [`Error::Parse`] when `INTERNALDATE`, `RFC822.SIZE` or
/// `ENVELOPE` is missing or malformed.
pub fn parse_envelope(text: &str) -> Result<EnvelopeSummary> {
    let items = fetch_attributes(text)?;
    envelope(&items, text)
}

/// Named body parts of a FETCH response.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the body structure is missing or a
/// named part has no size.
pub fn parse_attachments(text: &str) -> Result<Vec<Attachment>> {
    let items = fetch_attributes(text)?;
    attachments(&items, text)
}

/// Envelope and attachments of a FETCH response in one pass.
///
/// # Errors
///
/// See [`parse_envelope`] and [`parse_attachments`].
pub fn parse_message(text: &str) -> Result<MessageSummary> {
    let items = fetch_attributes(text)?;
    Ok(MessageSummary {
        envelope: envelope(&items, text)?,
        attachments: attachments(&items, text)?,
    })
}

/// The attribute list following `FETCH`.
fn fetch_attributes(text: &str) -> Result<Vec<Value<'_>>> {
    let start = text
        .find(" FETCH (")
        .ok_or_else(|| Error::parse("no FETCH data", text))?;
    let mut reader = Reader::at(text, start + " FETCH ".len());
    match reader.read_value() {
        Ok(Value::List(items)) => Ok(items),
        Ok(_) => Err(Error::parse("FETCH data is not a list", text)),
        Err(reason) => Err(Error::parse(reason, text)),
    }
}

fn attribute<'v, 'a>(items: &'v [Value<'a>], name: &str) -> Option<&'v Value<'a>> {
    items
        .chunks(2)
        .find(|pair| pair[0].is_atom(name))
        .and_then(|pair| pair.get(1))
}

fn envelope(items: &[Value<'_>], raw: &str) -> Result<EnvelopeSummary> {
    let date = attribute(items, "INTERNALDATE")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::parse("missing INTERNALDATE", raw))?;
    let size = attribute(items, "RFC822.SIZE")
        .and_then(Value::as_number)
        .ok_or_else(|| Error::parse("missing RFC822.SIZE", raw))?;
    let fields = attribute(items, "ENVELOPE")
        .and_then(Value::as_list)
        .ok_or_else(|| Error::parse("missing ENVELOPE", raw))?;

    let [_date, subject, from, _sender, _reply_to, to, ..] = fields else {
        return Err(Error::parse(
            format!("ENVELOPE has {} fields, expected at least 6", fields.len()),
            raw,
        ));
    };

    Ok(EnvelopeSummary {
        date: date.to_string(),
        size,
        from: first_address(from, raw)?,
        to: first_address(to, raw)?,
        subject: subject_text(subject, raw)?,
    })
}

fn subject_text(value: &Value<'_>, raw: &str) -> Result<String> {
    if value.is_nil() {
        return Ok("-".to_string());
    }
    let subject = value
        .as_str()
        .ok_or_else(|| Error::parse("subject is not a string", raw))?;
    Ok(escape_line_breaks(&decode_header(subject)))
}

/// Keep the report one line per message.
fn escape_line_breaks(s: &str) -> String {
    s.replace("\r\n", "\\n").replace(['\n', '\r'], "\\n")
}

/// First entry of an envelope address list; empty when the list is
/// `NIL`.
fn first_address(value: &Value<'_>, raw: &str) -> Result<Address> {
    if value.is_nil() {
        return Ok(Address::default());
    }
    let list = value
        .as_list()
        .ok_or_else(|| Error::parse("address list is not a list", raw))?;
    let Some(first) = list.first() else {
        return Ok(Address::default());
    };

    let Some([name, _adl, mailbox, host, ..]) = first.as_list() else {
        return Err(Error::parse("address is not a 4-field list", raw));
    };
    let text = |v: &Value<'_>| v.as_str().map(decode_header).unwrap_or_default();

    Ok(Address {
        name: text(name),
        mailbox: text(mailbox),
        host: text(host),
    })
}

fn attachments(items: &[Value<'_>], raw: &str) -> Result<Vec<Attachment>> {
    let body = attribute(items, "BODYSTRUCTURE")
        .or_else(|| attribute(items, "BODY"))
        .ok_or_else(|| Error::parse("missing BODY", raw))?;

    let mut found = Vec::new();
    collect_attachments(body, &mut found, raw)?;
    Ok(found)
}

/// Walk a body structure depth-first. Multiparts start with their
/// child parts; single parts are
/// `(type subtype params id description encoding size ...)`.
fn collect_attachments(part: &Value<'_>, found: &mut Vec<Attachment>, raw: &str) -> Result<()> {
    let fields = part
        .as_list()
        .ok_or_else(|| Error::parse("body part is not a list", raw))?;

    if fields.first().and_then(Value::as_list).is_some() {
        for child in fields.iter().take_while(|v| v.as_list().is_some()) {
            collect_attachments(child, found, raw)?;
        }
        return Ok(());
    }

    let Some(name) = part_name(fields) else {
        return Ok(());
    };
    let size = fields
        .get(6)
        .and_then(Value::as_number)
        .ok_or_else(|| Error::parse(format!("attachment '{name}' has no size"), raw))?;

    found.push(Attachment { name, size });
    Ok(())
}

/// `NAME` from the body parameters, else `FILENAME` from the
/// disposition.
fn part_name(fields: &[Value<'_>]) -> Option<String> {
    fields
        .get(2)
        .and_then(Value::as_list)
        .and_then(|params| param(params, "NAME"))
        .or_else(|| fields.iter().skip(7).find_map(disposition_filename))
        .map(decode_header)
}

fn disposition_filename<'v>(value: &'v Value<'_>) -> Option<&'v str> {
    let [kind, params, ..] = value.as_list()? else {
        return None;
    };
    kind.as_str()?;
    param(params.as_list()?, "FILENAME")
}

fn param<'v>(params: &'v [Value<'_>], key: &str) -> Option<&'v str> {
    params
        .chunks(2)
        .find(|pair| pair[0].as_str().is_some_and(|k| k.eq_ignore_ascii_case(key)))
        .and_then(|pair| pair.get(1))
        .and_then(Value::as_str)
}
