//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2. The same lexer
//! serves file bodies and content streams; only file bodies recognize
//! `num gen R` references.

use super::source::ByteSource;
use crate::error::{PdfError, Result};
use crate::objects::{parse_pdf_date, ObjectId};
use chrono::{DateTime, FixedOffset};

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// Boolean: true or false
    Boolean(bool),

    /// Name object with `#XX` escapes decoded (e.g., /Type), one char per
    /// byte so `/caf#E9` and `/caf#C3#A9` stay distinct
    Name(String),

    /// Literal string, escapes resolved
    LiteralString(Vec<u8>),

    /// Hexadecimal string, decoded
    HexString(Vec<u8>),

    /// Literal string that parses as a PDF date
    Date {
        raw: Vec<u8>,
        value: DateTime<FixedOffset>,
    },

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    /// Bare word: operators, `obj`, `stream`, `xref`, ...
    Keyword(String),

    /// Comment body without the leading `%`
    Comment(Vec<u8>),

    /// Reference (e.g., 1 0 R)
    Reference(ObjectId),

    /// Null object
    Null,

    /// End of input
    Eof,
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Keyword(k) if k == keyword)
    }
}

pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\0' | b'\t' | b'\x0C' | b'\r' | b'\n')
}

pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'/' | b'%')
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// PDF Lexer over any [`ByteSource`]
#[derive(Debug)]
pub struct Lexer<S> {
    source: S,
    resolve_references: bool,
    /// Set while a reference lookahead is in flight so it cannot nest
    multiple_token_parsing: bool,
}

impl<S: ByteSource> Lexer<S> {
    /// Lexer for file bodies: `num gen R` collapses into [`Token::Reference`].
    pub fn new(source: S) -> Self {
        Self {
            source,
            resolve_references: true,
            multiple_token_parsing: false,
        }
    }

    /// Lexer for content streams, where integers are never references.
    pub fn for_content(source: S) -> Self {
        Self {
            source,
            resolve_references: false,
            multiple_token_parsing: false,
        }
    }

    pub fn position(&self) -> usize {
        self.source.position()
    }

    pub fn seek(&mut self, position: usize) {
        self.source.seek(position);
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let Some(ch) = self.source.peek() else {
            return Ok(Token::Eof);
        };

        match ch {
            b'%' => Ok(self.read_comment()),
            b'/' => self.read_name(),
            b'(' => self.read_literal_string(),
            b'<' => self.read_angle_bracket(),
            b'>' => {
                let position = self.position();
                if self.source.peek_at(1) == Some(b'>') {
                    self.source.advance(2);
                    Ok(Token::DictEnd)
                } else {
                    self.source.advance(1);
                    Err(PdfError::syntax(position, "Unexpected '>'"))
                }
            }
            b'[' => {
                self.source.advance(1);
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.source.advance(1);
                Ok(Token::ArrayEnd)
            }
            b')' => {
                let position = self.position();
                self.source.advance(1);
                Err(PdfError::syntax(position, "Unexpected ')'"))
            }
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.read_number(),
            _ => Ok(self.read_keyword()),
        }
    }

    /// Look at the next token without consuming it
    pub fn peek_token(&mut self) -> Result<Token> {
        let saved = self.position();
        let token = self.next_token();
        self.seek(saved);
        token
    }

    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.source.peek() {
            if !is_whitespace(b) {
                break;
            }
            self.source.advance(1);
        }
    }

    /// Read exactly `count` raw bytes at the cursor.
    pub fn read_raw(&mut self, count: usize) -> Result<Vec<u8>> {
        let start = self.position();
        let end = start.checked_add(count).unwrap_or(usize::MAX);
        if end > self.source.len() {
            return Err(PdfError::EndOfStream {
                position: self.source.len(),
            });
        }
        let bytes = self.source.copy_range(start, end);
        self.seek(end);
        Ok(bytes)
    }

    /// Absolute position of the first occurrence of `needle` within
    /// `limit` bytes after `from`.
    pub fn find(&self, needle: &[u8], from: usize, limit: usize) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        let end = from.saturating_add(limit).min(self.source.len());
        let window = self.source.copy_range(from, end);
        window
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|i| from + i)
    }

    /// Consume a keyword or fail with a syntax error
    pub fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        let position = self.position();
        match self.next_token()? {
            Token::Keyword(k) if k == keyword => Ok(()),
            other => Err(PdfError::syntax(
                position,
                format!("Expected keyword '{keyword}', found {other:?}"),
            )),
        }
    }

    fn at_token_end(&self) -> bool {
        match self.source.peek() {
            None => true,
            Some(b) => is_whitespace(b) || is_delimiter(b) || self.source.at_segment_start(),
        }
    }

    fn read_comment(&mut self) -> Token {
        self.source.advance(1);
        let mut comment = Vec::new();
        while let Some(b) = self.source.peek() {
            if b == b'\r' || b == b'\n' {
                break;
            }
            comment.push(b);
            self.source.advance(1);
        }
        Token::Comment(comment)
    }

    fn read_name(&mut self) -> Result<Token> {
        self.source.advance(1);
        let mut bytes = Vec::new();

        while !self.at_token_end() {
            let Some(b) = self.source.peek() else {
                break;
            };
            if b == b'#' {
                let hi = self.source.peek_at(1);
                let lo = self.source.peek_at(2);
                match (hi.and_then(hex_value), lo.and_then(hex_value)) {
                    (Some(h), Some(l)) => {
                        bytes.push(h << 4 | l);
                        self.source.advance(3);
                        continue;
                    }
                    _ if hi.is_none() || (hi.is_some_and(|h| hex_value(h).is_some()) && lo.is_none()) => {
                        return Err(PdfError::syntax(
                            self.position(),
                            "Unexpected end of name at EOF",
                        ));
                    }
                    // Pre-1.2 names may contain a bare '#'
                    _ => {}
                }
            }
            bytes.push(b);
            self.source.advance(1);
        }

        Ok(Token::Name(bytes.into_iter().map(char::from).collect()))
    }

    fn read_literal_string(&mut self) -> Result<Token> {
        let start = self.position();
        self.source.advance(1);
        let unterminated = || PdfError::syntax(start, "Unterminated literal string");

        let mut bytes = Vec::new();
        let mut depth = 1usize;
        loop {
            let ch = self.source.next_byte().ok_or_else(unterminated)?;
            match ch {
                b'\\' => {
                    let escaped = self.source.next_byte().ok_or_else(unterminated)?;
                    match escaped {
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'b' => bytes.push(b'\x08'),
                        b'f' => bytes.push(b'\x0C'),
                        // Line continuation
                        b'\r' => {
                            if self.source.peek() == Some(b'\n') {
                                self.source.advance(1);
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u16::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.source.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u16::from(d - b'0');
                                        self.source.advance(1);
                                    }
                                    _ => break,
                                }
                            }
                            bytes.push(value as u8);
                        }
                        // Covers \( \) \\ and unknown escapes
                        other => bytes.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    bytes.push(ch);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(ch);
                }
                _ => bytes.push(ch),
            }
        }

        if bytes.starts_with(b"D:") {
            if let Some(value) = parse_pdf_date(&bytes) {
                return Ok(Token::Date { raw: bytes, value });
            }
        }
        Ok(Token::LiteralString(bytes))
    }

    fn read_angle_bracket(&mut self) -> Result<Token> {
        let start = self.position();
        self.source.advance(1);

        if self.source.peek() == Some(b'<') {
            self.source.advance(1);
            return Ok(Token::DictStart);
        }

        let mut nibbles = Vec::new();
        loop {
            let Some(ch) = self.source.next_byte() else {
                return Err(PdfError::syntax(start, "Unterminated hex string"));
            };
            if ch == b'>' {
                break;
            }
            if let Some(value) = hex_value(ch) {
                nibbles.push(value);
            } else if !is_whitespace(ch) {
                return Err(PdfError::syntax(
                    self.position() - 1,
                    "Invalid character in hex string",
                ));
            }
        }

        // Odd digit count: the last one is padded with 0
        if nibbles.len() % 2 != 0 {
            nibbles.push(0);
        }
        let bytes = nibbles.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect();
        Ok(Token::HexString(bytes))
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.position();
        let mut text = String::new();
        let mut digits = 0usize;
        let mut seen_dot = false;

        if let Some(sign @ (b'+' | b'-')) = self.source.peek() {
            text.push(sign as char);
            self.source.advance(1);
        }

        while !self.at_token_end() || text.is_empty() {
            match self.source.peek() {
                Some(d) if d.is_ascii_digit() => {
                    text.push(d as char);
                    digits += 1;
                }
                Some(b'.') if !seen_dot => {
                    text.push('.');
                    seen_dot = true;
                }
                _ => break,
            }
            self.source.advance(1);
        }

        if digits == 0 {
            return Err(PdfError::syntax(start, format!("Invalid number '{text}'")));
        }

        if !seen_dot {
            if let Ok(value) = text.parse::<i64>() {
                if let Some(id) = self.try_reference(value) {
                    return Ok(Token::Reference(id));
                }
                return Ok(Token::Integer(value));
            }
        }

        text.parse::<f64>()
            .map(Token::Real)
            .map_err(|_| PdfError::syntax(start, format!("Invalid number '{text}'")))
    }

    /// Bounded lookahead for `gen R` after an object number. Rolls back to
    /// just after the number when the next two tokens do not complete it.
    fn try_reference(&mut self, number: i64) -> Option<ObjectId> {
        if !self.resolve_references || self.multiple_token_parsing {
            return None;
        }
        let number = u32::try_from(number).ok()?;

        let saved = self.position();
        self.multiple_token_parsing = true;
        let generation = match self.next_token() {
            Ok(Token::Integer(generation)) => u16::try_from(generation).ok(),
            _ => None,
        };
        let id = match generation {
            Some(generation) => match self.next_token() {
                Ok(token) if token.is_keyword("R") => Some(ObjectId::new(number, generation)),
                _ => None,
            },
            None => None,
        };
        self.multiple_token_parsing = false;

        if id.is_none() {
            self.seek(saved);
        }
        id
    }

    fn read_keyword(&mut self) -> Token {
        let mut bytes = Vec::new();
        loop {
            let Some(b) = self.source.peek() else {
                break;
            };
            bytes.push(b);
            self.source.advance(1);
            if self.at_token_end() {
                break;
            }
        }

        match bytes.as_slice() {
            b"true" => Token::Boolean(true),
            b"false" => Token::Boolean(false),
            b"null" => Token::Null,
            _ => Token::Keyword(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}
