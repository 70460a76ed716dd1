//! Reader for IMAP response values
//!
//! Server data is a sequence of atoms, quoted strings, `{n}` literals,
//! `NIL` and parenthesized lists. [`Reader`] walks a response text and
//! hands back [`Value`] trees; the extraction functions in
//! [`crate::parser`] then pick fields out by position or by name.

use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<'a> {
    Nil,
    /// Bare token: numbers, flags, attribute names.
    Atom(&'a str),
    /// Quoted string (escapes resolved) or literal.
    Str(Cow<'a, str>),
    List(Vec<Value<'a>>),
}

impl Value<'_> {
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// String content of a quoted string, literal or atom.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Atom(s) => Some(*s),
            Self::Str(s) => Some(&**s),
            Self::Nil | Self::List(_) => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Atom(s) => s.parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Case-insensitive atom comparison.
    #[must_use]
    pub fn is_atom(&self, name: &str) -> bool {
        matches!(self, Self::Atom(a) if a.eq_ignore_ascii_case(name))
    }
}

/// Cursor over a response text.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Start reading at byte offset `pos`, which must lie on a char
    /// boundary.
    #[must_use]
    pub const fn at(input: &'a str, pos: usize) -> Self {
        Self { input, pos }
    }

    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// The unread remainder.
    #[must_use]
    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Consume `prefix` (ASCII, case-insensitive) if the input continues
    /// with it.
    pub fn eat(&mut self, prefix: &str) -> bool {
        let rest = self.rest().as_bytes();
        if rest.len() >= prefix.len()
            && rest[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
        {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    /// Move past the next line break.
    pub fn skip_line(&mut self) {
        self.pos = self
            .rest()
            .find('\n')
            .map_or(self.input.len(), |i| self.pos + i + 1);
    }

    /// Read one value.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the input ends early
    /// or a string, literal or list is malformed.
    pub fn read_value(&mut self) -> Result<Value<'a>, String> {
        self.skip_spaces();
        match self.peek() {
            None => Err(format!("unexpected end of input at byte {}", self.pos)),
            Some(b'(') => self.read_list(),
            Some(b')') => Err(format!("unexpected ')' at byte {}", self.pos)),
            Some(b'"') => self.read_quoted(),
            Some(b'{') => self.read_literal(),
            Some(_) => self.read_atom(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn read_list(&mut self) -> Result<Value<'a>, String> {
        let open = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(format!("unterminated list opened at byte {open}")),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                Some(_) => items.push(self.read_value()?),
            }
        }
    }

    fn read_quoted(&mut self) -> Result<Value<'a>, String> {
        let open = self.pos;
        let input = self.input;
        let mut out = String::new();
        let mut chars = input[open + 1..].char_indices();
        loop {
            match chars.next() {
                None => return Err(format!("unterminated string opened at byte {open}")),
                Some((i, '"')) => {
                    self.pos = open + 1 + i + 1;
                    return Ok(Value::Str(Cow::Owned(out)));
                }
                Some((_, '\\')) => match chars.next() {
                    Some((_, c)) => out.push(c),
                    None => return Err(format!("dangling escape in string at byte {open}")),
                },
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn read_literal(&mut self) -> Result<Value<'a>, String> {
        let open = self.pos;
        let rest = &self.input[open + 1..];
        let close = rest
            .find('}')
            .ok_or_else(|| format!("unterminated literal size at byte {open}"))?;
        let len: usize = rest[..close]
            .trim_end_matches('+')
            .parse()
            .map_err(|_| format!("bad literal size '{}' at byte {open}", &rest[..close]))?;

        self.pos = open + 1 + close + 1;
        if !self.eat("\r\n") && !self.eat("\n") {
            return Err(format!("literal size not followed by a line break at byte {open}"));
        }

        let start = self.pos;
        let end = start + len;
        if end > self.input.len() {
            return Err(format!("literal at byte {open} truncated"));
        }
        if !self.input.is_char_boundary(end) {
            return Err(format!("literal at byte {open} splits a character"));
        }
        self.pos = end;
        Ok(Value::Str(Cow::Borrowed(&self.input[start..end])))
    }

    fn read_atom(&mut self) -> Result<Value<'a>, String> {
        let start = self.pos;
        let mut brackets = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'[' => brackets += 1,
                b']' => brackets = brackets.saturating_sub(1),
                b' ' | b'(' | b')' | b'"' if brackets == 0 => break,
                b'\r' | b'\n' => break,
                _ => {}
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(format!("expected a value at byte {start}"));
        }

        let atom = &self.input[start..self.pos];
        if atom.eq_ignore_ascii_case("NIL") {
            Ok(Value::Nil)
        } else {
            Ok(Value::Atom(atom))
        }
    }
}
