// Shared lexer for RFC 7230 list-style header values

use crate::encoding::is_tchar;
use crate::error::{Error, Result};

/// Cursor over a header field value
///
/// Errors carry the header name so callers can `?` straight through.
pub(crate) struct Tokenizer<'a> {
    header: &'static str,
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(header: &'static str, input: &'a str) -> Self {
        Self {
            header,
            input,
            pos: 0,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    pub fn consume_char(&mut self) -> Result<char> {
        let ch = self
            .peek_char()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += ch.len_utf8();
        Ok(ch)
    }

    /// Consume `expected` if it is next
    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn expect_char(&mut self, expected: char) -> Result<()> {
        match self.peek_char() {
            Some(ch) if ch == expected => {
                self.pos += ch.len_utf8();
                Ok(())
            }
            Some(ch) => Err(self.error(format!(
                "expected '{}' but found '{}' at position {}",
                expected, ch, self.pos
            ))),
            None => Err(self.error(format!("expected '{}' but found end of input", expected))),
        }
    }

    /// Skip optional whitespace
    pub fn skip_ows(&mut self) {
        while matches!(self.peek_char(), Some(' ' | '\t')) {
            self.pos += 1;
        }
    }

    /// Skip whitespace and any run of empty list elements
    pub fn skip_list_separators(&mut self) {
        while matches!(self.peek_char(), Some(' ' | '\t' | ',')) {
            self.pos += 1;
        }
    }

    pub fn token(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while self.peek_char().is_some_and(is_tchar) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(match self.peek_char() {
                Some(ch) => self.error(format!("expected token but found '{}' at position {}", ch, self.pos)),
                None => self.error("expected token but found end of input"),
            });
        }
        Ok(&self.input[start..self.pos])
    }

    /// RFC 7235 token68: base64-ish characters followed by optional padding
    pub fn token68(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || "-._~+/".contains(c))
        {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        while self.peek_char() == Some('=') {
            self.pos += 1;
        }
        Some(&self.input[start..self.pos])
    }

    pub fn quoted_string(&mut self) -> Result<String> {
        let open = self.pos;
        self.expect_char('"')?;
        let mut value = String::new();
        loop {
            match self.peek_char() {
                Some('"') => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some('\\') => {
                    self.pos += 1;
                    value.push(self.consume_char()?);
                }
                Some(_) => value.push(self.consume_char()?),
                None => {
                    return Err(self.error(format!("unterminated quoted-string starting at position {}", open)));
                }
            }
        }
    }

    /// A parameter value: a quoted-string or a token. The flag reports quoting.
    pub fn value(&mut self) -> Result<(String, bool)> {
        if self.peek_char() == Some('"') {
            Ok((self.quoted_string()?, true))
        } else {
            Ok((self.token()?.to_string(), false))
        }
    }

    /// Consume everything up to (not including) the first `stop` character
    pub fn until(&mut self, stop: char) -> &'a str {
        let start = self.pos;
        let end = self.input[start..]
            .find(stop)
            .map_or(self.input.len(), |i| start + i);
        self.pos = end;
        &self.input[start..end]
    }

    /// Save and restore for speculative parses
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn error(&self, reason: impl Into<String>) -> Error {
        Error::header(self.header, reason)
    }
}
