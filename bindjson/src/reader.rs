// SPDX-License-Identifier: Apache-2.0

//! Token-level JSON input: a position-tracked cursor over bounded or
//! streaming bytes.
//!
//! Bounded mode borrows the whole document; streaming mode owns a buffer
//! refilled from a [`ByteSource`], compacting the unconsumed tail so tokens
//! split across refill boundaries are reassembled transparently. Reported
//! positions are always global stream offsets, not buffer indices.

use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::escape;
use crate::input::ByteSource;
use crate::parse_num;

const DEFAULT_STREAM_CAPACITY: usize = 4096;
const DEFAULT_MAX_DEPTH: usize = 512;

/// The token kinds surfaced by [`JsonReader::next_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Null,
    True,
    False,
    Number,
    String,
    ArrayStart,
    ArrayEnd,
    ObjectStart,
    ObjectEnd,
    Eof,
}

enum Buffer<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl Buffer<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            Buffer::Borrowed(b) => b,
            Buffer::Owned(v) => v,
        }
    }
}

/// Tokenizes JSON bytes into a position-tracked cursor.
///
/// One reader serves one deserialization operation. After any error the
/// cursor is poisoned: its state is undefined and further calls fail fast.
///
/// `String` and `Number` tokens are classified by [`Self::next_token`] but
/// consumed by the corresponding `read_*` (or [`Self::skip_value`]) call;
/// literals and structural tokens are consumed immediately.
pub struct JsonReader<'a> {
    buf: Buffer<'a>,
    /// Next unread index into the buffer.
    pos: usize,
    /// End of valid data in the buffer.
    end: usize,
    /// Global stream offset of the buffer's first byte.
    offset: usize,
    token: Token,
    /// First byte of the current token, for error messages.
    last: u8,
    source: Option<Box<dyn ByteSource + 'a>>,
    name_buf: Vec<u8>,
    string_buf: Vec<u8>,
    depth: usize,
    max_depth: usize,
    poisoned: bool,
}

impl<'a> JsonReader<'a> {
    /// Bounded mode: the entire input is already in one buffer.
    pub fn new(bytes: &'a [u8]) -> Self {
        JsonReader {
            end: bytes.len(),
            buf: Buffer::Borrowed(bytes),
            pos: 0,
            offset: 0,
            token: Token::Eof,
            last: 0,
            source: None,
            name_buf: Vec::new(),
            string_buf: Vec::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            poisoned: false,
        }
    }

    /// Streaming mode: bytes arrive incrementally from `source`.
    pub fn from_source(source: impl ByteSource + 'a) -> Self {
        Self::from_source_with_capacity(source, DEFAULT_STREAM_CAPACITY)
    }

    pub fn from_source_with_capacity(source: impl ByteSource + 'a, capacity: usize) -> Self {
        JsonReader {
            buf: Buffer::Owned(vec![0; capacity.max(64)]),
            pos: 0,
            end: 0,
            offset: 0,
            token: Token::Eof,
            last: 0,
            source: Some(Box::new(source)),
            name_buf: Vec::new(),
            string_buf: Vec::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            poisoned: false,
        }
    }

    /// Override the nesting bound (default 512).
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Global byte offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.offset + self.pos
    }

    /// The current token kind.
    pub fn token(&self) -> Token {
        self.token
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.poisoned = true;
        Err(err)
    }

    pub(crate) fn check_usable(&mut self) -> Result<()> {
        if self.poisoned {
            return self.fail(Error::parse(
                "Reader reused after a previous error".to_string(),
                self.position(),
            ));
        }
        Ok(())
    }

    /// Refill the owned buffer, dropping everything before `preserve_from`.
    ///
    /// Returns `(shift, more)`: how far the preserved data moved down (the
    /// caller must subtract it from any buffer index it holds) and whether
    /// new bytes arrived. Bounded readers always report `(0, false)`.
    fn refill(&mut self, preserve_from: usize) -> Result<(usize, bool)> {
        let Some(source) = self.source.as_mut() else {
            return Ok((0, false));
        };
        let Buffer::Owned(buf) = &mut self.buf else {
            return Ok((0, false));
        };
        let shift = preserve_from;
        if shift > 0 {
            buf.copy_within(shift..self.end, 0);
            self.end -= shift;
            self.pos -= shift;
            self.offset += shift;
        }
        if self.end == buf.len() {
            // A token larger than the buffer: double it.
            buf.resize(buf.len() * 2, 0);
        }
        let got = source.read_into(&mut buf[self.end..])?;
        log::trace!(
            "stream refill: +{got} bytes at offset {}, {} preserved",
            self.offset + self.end,
            self.end
        );
        self.end += got;
        Ok((shift, got > 0))
    }

    /// Advance past insignificant whitespace; returns the next significant
    /// byte without consuming it, or `None` at end of input.
    fn skip_whitespace(&mut self) -> Result<Option<u8>> {
        loop {
            while self.pos < self.end {
                let b = self.buf.bytes()[self.pos];
                match b {
                    b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                    _ => return Ok(Some(b)),
                }
            }
            if !self.refill(self.pos)?.1 {
                return Ok(None);
            }
        }
    }

    /// Consume the expected ASCII literal (e.g. `null`), which may span a
    /// refill boundary.
    fn expect_literal(&mut self, literal: &'static [u8]) -> Result<()> {
        while self.end - self.pos < literal.len() {
            if !self.refill(self.pos)?.1 {
                let position = self.position();
                return self.fail(Error::unexpected_end("a literal", position));
            }
        }
        let found = &self.buf.bytes()[self.pos..self.pos + literal.len()];
        if found != literal {
            let position = self.position();
            let msg = format!(
                "Expecting '{}'",
                std::str::from_utf8(literal).unwrap_or("literal")
            );
            return self.fail(Error::parse(msg, position));
        }
        self.pos += literal.len();
        Ok(())
    }

    /// Advance to the next value or structural token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.check_usable()?;
        let token = match self.skip_whitespace()? {
            None => {
                self.last = 0;
                Token::Eof
            }
            Some(b) => {
                self.last = b;
                match b {
                    b'{' => {
                        self.enter_nesting()?;
                        self.pos += 1;
                        Token::ObjectStart
                    }
                    b'}' => {
                        self.leave_nesting(b'}')?;
                        self.pos += 1;
                        Token::ObjectEnd
                    }
                    b'[' => {
                        self.enter_nesting()?;
                        self.pos += 1;
                        Token::ArrayStart
                    }
                    b']' => {
                        self.leave_nesting(b']')?;
                        self.pos += 1;
                        Token::ArrayEnd
                    }
                    b'"' => Token::String,
                    b'n' => {
                        self.expect_literal(b"null")?;
                        Token::Null
                    }
                    b't' => {
                        self.expect_literal(b"true")?;
                        Token::True
                    }
                    b'f' => {
                        self.expect_literal(b"false")?;
                        Token::False
                    }
                    b'-' | b'0'..=b'9' | b'N' | b'I' => Token::Number,
                    other => {
                        let position = self.position();
                        return self.fail(Error::parse(
                            format!("Unexpected '{}' while expecting a value", other as char),
                            position,
                        ));
                    }
                }
            }
        };
        self.token = token;
        Ok(token)
    }

    fn enter_nesting(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            let position = self.position();
            return self.fail(Error::parse(
                format!("Maximum nesting depth of {} exceeded", self.max_depth),
                position,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave_nesting(&mut self, close: u8) -> Result<()> {
        if self.depth == 0 {
            let position = self.position();
            return self.fail(Error::parse(
                format!("Unexpected '{}' outside any container", close as char),
                position,
            ));
        }
        self.depth -= 1;
        Ok(())
    }

    /// `true` when the current token is `null`.
    pub fn was_null(&self) -> bool {
        self.token == Token::Null
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.token {
            Token::True => Ok(true),
            Token::False => Ok(false),
            _ => {
                let position = self.position();
                let found = self.last as char;
                self.fail(Error::parse(
                    format!("Expecting 'true' or 'false'. Found '{found}'"),
                    position,
                ))
            }
        }
    }

    // ---- strings ----

    /// Read the current `String` token, resolving escapes. The returned
    /// slice borrows from the reader and is valid until the next call.
    pub fn read_string(&mut self) -> Result<&str> {
        let span = self.read_string_bytes()?;
        let valid = std::str::from_utf8(self.span_bytes(span)).is_ok();
        if !valid {
            let position = self.position();
            return self.fail(Error::parse("Invalid UTF-8 in string".to_string(), position));
        }
        Ok(std::str::from_utf8(self.span_bytes(span)).unwrap_or_default())
    }

    fn span_bytes(&self, span: StrSpan) -> &[u8] {
        match span {
            StrSpan::Buffer(start, end) => &self.buf.bytes()[start..end],
            StrSpan::Scratch => self.string_buf.as_slice(),
        }
    }

    /// Read the current `String` token into an owned value.
    pub fn read_string_owned(&mut self) -> Result<String> {
        self.read_string().map(str::to_owned)
    }

    fn read_string_bytes(&mut self) -> Result<StrSpan> {
        if self.token != Token::String {
            let (found, position) = (self.last, self.position());
            return self.fail(Error::expecting("\"", found, position));
        }
        self.pos += 1; // opening quote
        // Fast path: an escape-free span already in the buffer.
        let bytes = self.buf.bytes();
        let start = self.pos;
        let mut i = start;
        while i < self.end {
            match bytes[i] {
                b'"' => {
                    self.pos = i + 1;
                    return Ok(StrSpan::Buffer(start, i));
                }
                b'\\' => break,
                _ => i += 1,
            }
        }
        // Slow path: escapes present or the string spans a refill boundary.
        self.string_buf.clear();
        let prefix_start = start;
        let prefix_end = i;
        self.string_buf
            .extend_from_slice(&self.buf.bytes()[prefix_start..prefix_end]);
        self.pos = i;
        loop {
            if self.pos >= self.end {
                if !self.refill(self.pos)?.1 {
                    let position = self.position();
                    return self.fail(Error::parse(
                        "Unterminated string".to_string(),
                        position,
                    ));
                }
                continue;
            }
            let b = self.buf.bytes()[self.pos];
            match b {
                b'"' => {
                    self.pos += 1;
                    return Ok(StrSpan::Scratch);
                }
                b'\\' => {
                    self.pos += 1;
                    self.process_escape()?;
                }
                _ => {
                    self.string_buf.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    /// Process one escape sequence; the backslash is already consumed.
    fn process_escape(&mut self) -> Result<()> {
        let esc = self.require_byte("an escape sequence")?;
        self.pos += 1;
        if esc != b'u' {
            let position = self.position() - 1;
            let resolved = escape::process_simple_escape(esc, position);
            match resolved {
                Ok(b) => {
                    self.string_buf.push(b);
                    Ok(())
                }
                Err(e) => self.fail(e),
            }
        } else {
            let code = self.read_hex4()?;
            if escape::is_high_surrogate(code) {
                // A low surrogate escape must follow immediately.
                let position = self.position();
                if self.require_byte("a surrogate pair")? != b'\\' {
                    return self.fail(Error::parse(
                        "Unpaired high surrogate in Unicode escape".to_string(),
                        position,
                    ));
                }
                self.pos += 1;
                if self.require_byte("a surrogate pair")? != b'u' {
                    return self.fail(Error::parse(
                        "Unpaired high surrogate in Unicode escape".to_string(),
                        position,
                    ));
                }
                self.pos += 1;
                let low = self.read_hex4()?;
                let combined = match escape::combine_surrogate_pair(code, low, self.position()) {
                    Ok(c) => c,
                    Err(e) => return self.fail(e),
                };
                self.push_codepoint(combined)
            } else if escape::is_low_surrogate(code) {
                let position = self.position();
                self.fail(Error::parse(
                    "Unpaired low surrogate in Unicode escape".to_string(),
                    position,
                ))
            } else {
                self.push_codepoint(code)
            }
        }
    }

    fn push_codepoint(&mut self, code: u32) -> Result<()> {
        let position = self.position();
        match escape::push_codepoint(&mut self.string_buf, code, position) {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    /// Peek the next byte, refilling as needed; does not consume.
    fn require_byte(&mut self, what: &'static str) -> Result<u8> {
        while self.pos >= self.end {
            if !self.refill(self.pos)?.1 {
                let position = self.position();
                return self.fail(Error::unexpected_end(what, position));
            }
        }
        Ok(self.buf.bytes()[self.pos])
    }

    fn read_hex4(&mut self) -> Result<u32> {
        while self.end - self.pos < 4 {
            if !self.refill(self.pos)?.1 {
                let position = self.position();
                return self.fail(Error::unexpected_end("a Unicode escape", position));
            }
        }
        let position = self.position();
        let code = escape::parse_hex4(&self.buf.bytes()[self.pos..self.pos + 4], position);
        match code {
            Ok(c) => {
                self.pos += 4;
                Ok(c)
            }
            Err(e) => self.fail(e),
        }
    }

    // ---- object keys ----

    /// Read an object key and the following `:` without allocating a string,
    /// returning the FNV-1a hash of the raw key bytes. The raw bytes remain
    /// available through [`Self::last_name_matches`] for exact confirmation.
    pub fn fill_name(&mut self) -> Result<u32> {
        if self.token != Token::String {
            let (found, position) = (self.last, self.position());
            return self.fail(Error::expecting("\"", found, position));
        }
        self.pos += 1; // opening quote
        self.name_buf.clear();
        let mut hash: u32 = 0x811c_9dc5;
        let mut in_escape = false;
        loop {
            let b = match self.require_byte("an object key") {
                Ok(b) => b,
                Err(e) => return Err(e),
            };
            self.pos += 1;
            if b == b'"' && !in_escape {
                break;
            }
            in_escape = !in_escape && b == b'\\';
            hash ^= b as u32;
            hash = hash.wrapping_mul(0x0100_0193);
            self.name_buf.push(b);
        }
        match self.skip_whitespace()? {
            Some(b':') => {
                self.pos += 1;
                Ok(hash)
            }
            Some(found) => {
                let position = self.position();
                self.fail(Error::expecting(":", found, position))
            }
            None => {
                let position = self.position();
                self.fail(Error::unexpected_end("an object entry", position))
            }
        }
    }

    /// Exact raw-byte comparison against the last key read by `fill_name`.
    pub fn last_name_matches(&self, name: &str) -> bool {
        self.name_buf == name.as_bytes()
    }

    /// The last key read by `fill_name`, for error messages.
    pub fn last_name(&self) -> String {
        String::from_utf8_lossy(&self.name_buf).into_owned()
    }

    // ---- numbers ----

    /// Consume the current `Number` token, returning its buffer span and the
    /// global position of its first byte.
    fn number_span(&mut self) -> Result<(usize, usize, usize)> {
        if self.token != Token::Number {
            let (found, position) = (self.last, self.position());
            return self.fail(Error::expecting("number", found, position));
        }
        let mut start = self.pos;
        loop {
            if self.pos >= self.end {
                let (shift, more) = self.refill(start)?;
                start -= shift;
                if !more {
                    break;
                }
                continue;
            }
            match self.buf.bytes()[self.pos] {
                b' ' | b'\t' | b'\r' | b'\n' | b',' | b']' | b'}' | b':' => break,
                _ => self.pos += 1,
            }
        }
        Ok((start, self.pos, self.offset + start))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let (start, end, position) = self.number_span()?;
        let parsed = parse_num::parse_i32(&self.buf.bytes()[start..end], position);
        parsed.or_else(|e| self.fail(e))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let (start, end, position) = self.number_span()?;
        let parsed = parse_num::parse_i64(&self.buf.bytes()[start..end], position);
        parsed.or_else(|e| self.fail(e))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let (start, end, position) = self.number_span()?;
        let parsed = parse_num::parse_u64(&self.buf.bytes()[start..end], position);
        parsed.or_else(|e| self.fail(e))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let (start, end, position) = self.number_span()?;
        let parsed = parse_num::parse_f32(&self.buf.bytes()[start..end], position);
        parsed.or_else(|e| self.fail(e))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let (start, end, position) = self.number_span()?;
        let parsed = parse_num::parse_f64(&self.buf.bytes()[start..end], position);
        parsed.or_else(|e| self.fail(e))
    }

    /// Read the current `Number` token exactly, with no binary rounding.
    pub fn read_decimal(&mut self) -> Result<Decimal> {
        let (start, end, position) = self.number_span()?;
        let parsed = Decimal::from_ascii(&self.buf.bytes()[start..end], position);
        parsed.or_else(|e| self.fail(e))
    }

    // ---- navigation ----

    /// After a member value: consume `,` (more members follow, `true`) or
    /// `}` (object finished, `false`).
    pub fn comma_or_object_end(&mut self) -> Result<bool> {
        self.separator_or_end(b'}')
    }

    /// After an element: consume `,` (more elements follow, `true`) or `]`
    /// (array finished, `false`).
    pub fn comma_or_array_end(&mut self) -> Result<bool> {
        self.separator_or_end(b']')
    }

    fn separator_or_end(&mut self, close: u8) -> Result<bool> {
        match self.skip_whitespace()? {
            Some(b',') => {
                self.pos += 1;
                Ok(true)
            }
            Some(b) if b == close => {
                self.leave_nesting(close)?;
                self.pos += 1;
                self.token = if close == b'}' {
                    Token::ObjectEnd
                } else {
                    Token::ArrayEnd
                };
                Ok(false)
            }
            Some(found) => {
                let position = self.position();
                self.fail(Error::parse(
                    format!(
                        "Expecting ',' or '{}'. Found '{}'",
                        close as char, found as char
                    ),
                    position,
                ))
            }
            None => {
                let position = self.position();
                self.fail(Error::unexpected_end("a container", position))
            }
        }
    }

    /// Structurally skip the value whose first token is current, whatever
    /// its kind.
    pub fn skip_value(&mut self) -> Result<()> {
        match self.token {
            Token::Null | Token::True | Token::False => Ok(()),
            Token::Number => self.number_span().map(|_| ()),
            Token::String => self.skip_string_raw(),
            Token::ArrayStart => {
                if self.next_token()? == Token::ArrayEnd {
                    return Ok(());
                }
                loop {
                    self.skip_value()?;
                    if !self.comma_or_array_end()? {
                        return Ok(());
                    }
                    self.next_token()?;
                }
            }
            Token::ObjectStart => {
                match self.next_token()? {
                    Token::ObjectEnd => return Ok(()),
                    Token::String => {}
                    _ => {
                        let (found, position) = (self.last, self.position());
                        return self.fail(Error::expecting("\"", found, position));
                    }
                }
                loop {
                    self.fill_name()?;
                    self.next_token()?;
                    self.skip_value()?;
                    if !self.comma_or_object_end()? {
                        return Ok(());
                    }
                    if self.next_token()? != Token::String {
                        let (found, position) = (self.last, self.position());
                        return self.fail(Error::expecting("\"", found, position));
                    }
                }
            }
            Token::ArrayEnd | Token::ObjectEnd | Token::Eof => {
                let (found, position) = (self.last, self.position());
                self.fail(Error::expecting("value", found, position))
            }
        }
    }

    /// Consume a string token without resolving escapes.
    fn skip_string_raw(&mut self) -> Result<()> {
        self.pos += 1; // opening quote
        let mut in_escape = false;
        loop {
            let b = self.require_byte("a string")?;
            self.pos += 1;
            if b == b'"' && !in_escape {
                return Ok(());
            }
            in_escape = !in_escape && b == b'\\';
        }
    }

    /// Consume the current `Number` token and hand its raw bytes plus global
    /// position to `f`. Used by converters that classify the literal
    /// themselves.
    pub(crate) fn with_number_bytes<R>(
        &mut self,
        f: impl FnOnce(&[u8], usize) -> Result<R>,
    ) -> Result<R> {
        let (start, end, position) = self.number_span()?;
        let out = f(&self.buf.bytes()[start..end], position);
        out.or_else(|e| self.fail(e))
    }

    /// Build (and record) an `Expecting 'what'` error against the current
    /// token. Used by converters that find the wrong token kind.
    pub fn error_expecting(&mut self, what: &str) -> Error {
        self.poisoned = true;
        Error::expecting(what, self.last, self.position())
    }

    /// Consume the `:` between a map key and its value.
    pub fn expect_colon(&mut self) -> Result<()> {
        match self.skip_whitespace()? {
            Some(b':') => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => {
                let position = self.position();
                self.fail(Error::expecting(":", found, position))
            }
            None => {
                let position = self.position();
                self.fail(Error::unexpected_end("an object entry", position))
            }
        }
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let (start, end, position) = self.number_span()?;
        let parsed = parse_num::parse_u64(&self.buf.bytes()[start..end], position)
            .and_then(|v| {
                u32::try_from(v).map_err(|_| {
                    Error::parse("Number overflows a 32-bit unsigned integer".to_string(), position)
                })
            });
        parsed.or_else(|e| self.fail(e))
    }

    /// Verify nothing but whitespace remains.
    pub fn expect_eof(&mut self) -> Result<()> {
        match self.skip_whitespace()? {
            None => Ok(()),
            Some(found) => {
                let position = self.position();
                self.fail(Error::expecting("end of input", found, position))
            }
        }
    }
}

#[derive(Clone, Copy)]
enum StrSpan {
    /// Escape-free content directly in the input buffer.
    Buffer(usize, usize),
    /// Unescaped content accumulated in the scratch buffer.
    Scratch,
}
