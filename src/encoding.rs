//! RFC 2047 encoded-word decoding for header values
//!
//! Only header unwrapping is supported: `=?charset?B?...?=` and
//! `=?charset?Q?...?=` words are decoded in place, everything else is
//! passed through untouched.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

/// Servers are not consistent about trailing `=` padding.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode every encoded word in `text`.
///
/// Whitespace between two adjacent encoded words is dropped, as
/// RFC 2047 section 6.2 requires. A word that fails to decode is kept
/// verbatim.
#[must_use]
pub fn decode_header(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        if let Some((decoded, consumed)) = decode_word(candidate) {
            if !(after_word && before.chars().all(char::is_whitespace)) {
                out.push_str(before);
            }
            out.push_str(&decoded);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }
    out.push_str(rest);
    out
}

/// Decode one word at the start of `s`, returning the text and the
/// number of bytes consumed.
fn decode_word(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix("=?")?;
    let (charset, body) = body.split_once('?')?;
    let (encoding, body) = body.split_once('?')?;
    let end = body.find("?=")?;
    let payload = &body[..end];
    if charset.is_empty() || payload.contains(' ') {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => {
            let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            BASE64.decode(compact).ok()?
        }
        "Q" | "q" => decode_q(payload)?,
        _ => return None,
    };

    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
    Some((charset_decode(charset, &bytes), consumed))
}

/// The `Q` encoding: `_` is a space, `=XX` a hex byte.
fn decode_q(payload: &str) -> Option<Vec<u8>> {
    let raw = payload.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = payload.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    Some(out)
}

fn charset_decode(charset: &str, bytes: &[u8]) -> String {
    // RFC 2231 allows a language suffix: `utf-8*en`.
    let charset = charset.split('*').next().unwrap_or(charset);
    if charset.eq_ignore_ascii_case("iso-8859-1") || charset.eq_ignore_ascii_case("latin1") {
        bytes.iter().copied().map(char::from).collect()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
