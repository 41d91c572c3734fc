//! PDF Object Parser
//!
//! Parses PDF objects from tokens according to ISO 32000-1 Section 7.3

use super::lexer::{Lexer, Token};
use super::source::ByteSource;
use super::ParseOptions;
use crate::buffer::ByteBuffer;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId, PdfString, Stream};

/// Resolves indirect values needed while parsing, namely a stream
/// `/Length` given as a reference.
pub trait ReferenceResolver {
    /// Integer value of the object `id`, or `None` if it is not available.
    fn resolve_length(&mut self, id: ObjectId) -> Result<Option<i64>>;
}

/// Resolver that never resolves anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResolver;

impl ReferenceResolver for NoResolver {
    fn resolve_length(&mut self, _id: ObjectId) -> Result<Option<i64>> {
        Ok(None)
    }
}

#[derive(Debug)]
pub struct ObjectParser<S> {
    lexer: Lexer<S>,
    options: ParseOptions,
}

impl<S: ByteSource> ObjectParser<S> {
    pub fn new(lexer: Lexer<S>, options: ParseOptions) -> Self {
        Self { lexer, options }
    }

    pub fn lexer(&self) -> &Lexer<S> {
        &self.lexer
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer<S> {
        &mut self.lexer
    }

    pub fn into_lexer(self) -> Lexer<S> {
        self.lexer
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    /// Next non-comment token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.next_positioned_token().map(|(_, token)| token)
    }

    /// Next non-comment token together with the offset it starts at.
    pub fn next_positioned_token(&mut self) -> Result<(usize, Token)> {
        loop {
            self.lexer.skip_whitespace();
            let position = self.lexer.position();
            match self.lexer.next_token()? {
                Token::Comment(_) => continue,
                token => return Ok((position, token)),
            }
        }
    }

    /// Parse the next object from the input.
    pub fn parse_object(&mut self, resolver: &mut dyn ReferenceResolver) -> Result<Object> {
        let (position, token) = self.next_positioned_token()?;
        self.parse_from_token(token, position, resolver)
    }

    /// Build an object starting with an already-read token. `position` is
    /// where that token began, for error reporting.
    pub fn parse_from_token(
        &mut self,
        token: Token,
        position: usize,
        resolver: &mut dyn ReferenceResolver,
    ) -> Result<Object> {
        match token {
            Token::Null => Ok(Object::Null),
            Token::Boolean(b) => Ok(Object::Boolean(b)),
            Token::Integer(i) => Ok(Object::Integer(i)),
            Token::Real(r) => Ok(Object::Real(r)),
            Token::LiteralString(bytes) => Ok(Object::String(PdfString::new(bytes))),
            Token::Date { raw, .. } => Ok(Object::String(PdfString::new(raw))),
            Token::HexString(bytes) => Ok(Object::String(PdfString::hex(bytes))),
            Token::Name(name) => Ok(Object::Name(name)),
            Token::Reference(id) => Ok(Object::Reference(id)),
            Token::ArrayStart => self.parse_array(resolver),
            Token::DictStart => self.parse_dictionary_or_stream(resolver),
            Token::Eof => Err(PdfError::syntax(position, "Unexpected end of file")),
            other => Err(PdfError::syntax(
                position,
                format!("Unexpected token {other:?}"),
            )),
        }
    }

    fn parse_array(&mut self, resolver: &mut dyn ReferenceResolver) -> Result<Object> {
        let mut elements = Vec::new();
        loop {
            match self.next_positioned_token()? {
                (_, Token::ArrayEnd) => return Ok(Object::Array(elements)),
                (position, token) => {
                    elements.push(self.parse_from_token(token, position, resolver)?)
                }
            }
        }
    }

    /// Parse dictionary entries after `<<` up to and including `>>`.
    pub fn parse_dictionary(&mut self, resolver: &mut dyn ReferenceResolver) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            let (position, token) = self.next_positioned_token()?;
            let key = match token {
                Token::DictEnd => return Ok(dict),
                Token::Name(name) => name,
                Token::Eof => {
                    return Err(PdfError::syntax(position, "Unterminated dictionary"));
                }
                other => {
                    return Err(PdfError::syntax(
                        position,
                        format!("Expected name or >>, found {other:?}"),
                    ));
                }
            };
            let value = self.parse_object(resolver)?;
            dict.set(key, value);
        }
    }

    fn parse_dictionary_or_stream(&mut self, resolver: &mut dyn ReferenceResolver) -> Result<Object> {
        let dict = self.parse_dictionary(resolver)?;

        let saved = self.lexer.position();
        match self.next_token() {
            Ok(token) if token.is_keyword("stream") => {
                let body = self.read_stream_body(&dict, resolver)?;
                Ok(Object::Stream(Stream::from_parts(dict, body)))
            }
            _ => {
                self.lexer.seek(saved);
                Ok(Object::Dictionary(dict))
            }
        }
    }

    /// Read stream data after the `stream` keyword, leaving the cursor past
    /// `endstream`.
    fn read_stream_body(
        &mut self,
        dict: &Dictionary,
        resolver: &mut dyn ReferenceResolver,
    ) -> Result<ByteBuffer> {
        self.skip_stream_eol();
        let start = self.lexer.position();

        let declared = match dict.get("Length") {
            Some(Object::Integer(length)) => Some(*length),
            Some(Object::Reference(id)) => {
                let length = resolver.resolve_length(*id)?;
                self.lexer.seek(start);
                length
            }
            _ => None,
        };
        let declared = declared.and_then(|length| usize::try_from(length).ok());

        if let Some(length) = declared {
            if start.saturating_add(length) <= self.lexer.len() {
                let data = self.lexer.read_raw(length)?;
                let end_position = self.lexer.position();
                match self.next_token() {
                    Ok(token) if token.is_keyword("endstream") => return Ok(ByteBuffer::from(data)),
                    _ if !self.options.recover_stream_length => {
                        return Err(PdfError::syntax(
                            end_position,
                            "Expected 'endstream' after stream data",
                        ));
                    }
                    _ => {}
                }
            } else if !self.options.recover_stream_length {
                return Err(PdfError::structure(format!(
                    "Stream /Length {length} at offset {start} runs past end of input"
                )));
            }
        } else if !self.options.recover_stream_length {
            return Err(PdfError::structure(format!(
                "Stream at offset {start} has no resolvable /Length"
            )));
        }

        self.recover_stream_body(start)
    }

    /// Locate `endstream` by scanning and take everything before it.
    fn recover_stream_body(&mut self, start: usize) -> Result<ByteBuffer> {
        let limit = self.lexer.len().saturating_sub(start);
        let Some(found) = self.lexer.find(b"endstream", start, limit) else {
            return Err(PdfError::EndOfStream {
                position: self.lexer.len(),
            });
        };
        tracing::warn!(
            "Recovered stream at offset {} by scanning for endstream ({} bytes)",
            start,
            found - start
        );

        self.lexer.seek(start);
        let mut data = self.lexer.read_raw(found - start)?;
        if data.ends_with(b"\r\n") {
            data.truncate(data.len() - 2);
        } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
            data.truncate(data.len() - 1);
        }
        self.lexer.seek(found + b"endstream".len());
        Ok(ByteBuffer::from(data))
    }

    /// `stream` is followed by CRLF or LF. A bare CR is accepted too, and
    /// lenient parsing also skips stray spaces before the line ending.
    fn skip_stream_eol(&mut self) {
        let source = self.lexer.source_mut();
        if self.options.lenient {
            while source.peek() == Some(b' ') {
                source.advance(1);
            }
        }
        match (source.peek(), source.peek_at(1)) {
            (Some(b'\r'), Some(b'\n')) => source.advance(2),
            (Some(b'\n'), _) | (Some(b'\r'), _) => source.advance(1),
            _ => {}
        }
    }

    /// Parse `num gen obj <object> endobj` at the cursor.
    pub fn parse_indirect_object(
        &mut self,
        resolver: &mut dyn ReferenceResolver,
    ) -> Result<(ObjectId, Object)> {
        let (position, token) = self.next_positioned_token()?;
        let number = match token {
            Token::Integer(n) => u32::try_from(n).ok(),
            _ => None,
        };
        let generation = match self.next_token()? {
            Token::Integer(g) => u16::try_from(g).ok(),
            _ => None,
        };
        let (Some(number), Some(generation)) = (number, generation) else {
            return Err(PdfError::syntax(position, "Expected indirect object header"));
        };
        self.lexer.expect_keyword("obj")?;

        let object = self.parse_object(resolver)?;

        let saved = self.lexer.position();
        match self.next_token() {
            Ok(token) if token.is_keyword("endobj") => {}
            _ => {
                tracing::debug!("Object {} {} is missing endobj", number, generation);
                self.lexer.seek(saved);
            }
        }

        Ok((ObjectId::new(number, generation), object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::source::SliceSource;
    use std::collections::HashMap;

    fn parser(input: &[u8]) -> ObjectParser<SliceSource<'_>> {
        ObjectParser::new(Lexer::new(SliceSource::new(input)), ParseOptions::default())
    }

    fn parse(input: &[u8]) -> Object {
        parser(input).parse_object(&mut NoResolver).unwrap()
    }

    struct MapResolver(HashMap<u32, i64>);

    impl ReferenceResolver for MapResolver {
        fn resolve_length(&mut self, id: ObjectId) -> Result<Option<i64>> {
            Ok(self.0.get(&id.number()).copied())
        }
    }

    #[test]
    fn test_parse_simple_objects() {
        assert_eq!(parse(b"null"), Object::Null);
        assert_eq!(parse(b"true"), Object::Boolean(true));
        assert_eq!(parse(b"-7"), Object::Integer(-7));
        assert_eq!(parse(b"2.5"), Object::Real(2.5));
        assert_eq!(parse(b"/Font"), Object::name("Font"));
        assert_eq!(parse(b"(hi)"), Object::String(PdfString::new(b"hi".to_vec())));
        assert_eq!(parse(b"<6869>"), Object::String(PdfString::hex(b"hi".to_vec())));
        assert_eq!(parse(b"5 0 R"), Object::Reference(ObjectId::new(5, 0)));
    }

    #[test]
    fn test_parse_array() {
        assert_eq!(
            parse(b"[1 2 0 R (x) [/A]]"),
            Object::Array(vec![
                Object::Integer(1),
                Object::Reference(ObjectId::new(2, 0)),
                Object::from("x"),
                Object::Array(vec![Object::name("A")]),
            ])
        );
    }

    #[test]
    fn test_parse_dictionary() {
        let obj = parse(b"<< /Type /Page /Parent 3 0 R /MediaBox [0 0 612 792] % note\n >>");
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get_type(), Some("Page"));
        assert_eq!(dict.get("Parent"), Some(&Object::Reference(ObjectId::new(3, 0))));
        assert_eq!(dict.len(), 3);
    }

    #[test]
    fn test_dictionary_key_must_be_name() {
        let err = parser(b"<< 1 2 >>").parse_object(&mut NoResolver).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.position(), Some(3));
    }

    #[test]
    fn test_unterminated_array() {
        assert!(parser(b"[1 2").parse_object(&mut NoResolver).is_err());
    }

    #[test]
    fn test_date_string_becomes_literal() {
        assert_eq!(
            parse(b"(D:20200101000000Z)"),
            Object::from("D:20200101000000Z")
        );
    }

    #[test]
    fn test_parse_stream_with_direct_length() {
        let obj = parse(b"<< /Length 11 >>\nstream\nHello World\nendstream");
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data(), b"Hello World");
    }

    #[test]
    fn test_parse_stream_with_indirect_length() {
        let input = b"<< /Length 8 0 R >>stream\r\nabc\r\nendstream";
        let mut resolver = MapResolver(HashMap::from([(8, 3)]));
        let obj = parser(input).parse_object(&mut resolver).unwrap();
        assert_eq!(obj.as_stream().unwrap().data(), b"abc");
    }

    #[test]
    fn test_stream_wrong_length_strict() {
        let input = b"<< /Length 3 >>\nstream\nHello World\nendstream";
        let err = parser(input).parse_object(&mut NoResolver).unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_stream_wrong_length_recovered() {
        let input = b"<< /Length 3 >>\nstream\nHello World\nendstream";
        let mut parser =
            ObjectParser::new(Lexer::new(SliceSource::new(input)), ParseOptions::lenient());
        let obj = parser.parse_object(&mut NoResolver).unwrap();
        assert_eq!(obj.as_stream().unwrap().data(), b"Hello World");
        assert_eq!(parser.lexer().position(), input.len());
    }

    #[test]
    fn test_stream_unresolved_length() {
        let input = b"<< /Length 9 0 R >>\nstream\nxyz\nendstream";
        let err = parser(input).parse_object(&mut NoResolver).unwrap_err();
        assert!(matches!(err, PdfError::Structure(_)));
    }

    #[test]
    fn test_dictionary_not_followed_by_stream() {
        let mut parser = parser(b"<< /A 1 >> 42");
        assert!(parser.parse_object(&mut NoResolver).unwrap().as_dict().is_some());
        assert_eq!(parser.parse_object(&mut NoResolver).unwrap(), Object::Integer(42));
    }

    #[test]
    fn test_parse_indirect_object() {
        let mut parser = parser(b"12 0 obj\n<< /Kids [13 0 R] >>\nendobj\n");
        let (id, obj) = parser.parse_indirect_object(&mut NoResolver).unwrap();
        assert_eq!(id, ObjectId::new(12, 0));
        assert_eq!(
            obj.as_dict().unwrap().get("Kids"),
            Some(&Object::Array(vec![Object::Reference(ObjectId::new(13, 0))]))
        );
    }

    #[test]
    fn test_parse_indirect_object_missing_endobj() {
        let mut parser = parser(b"4 0 obj 17\n5 0 obj 18 endobj");
        let (id, obj) = parser.parse_indirect_object(&mut NoResolver).unwrap();
        assert_eq!((id.number(), obj), (4, Object::Integer(17)));
        let (id, obj) = parser.parse_indirect_object(&mut NoResolver).unwrap();
        assert_eq!((id.number(), obj), (5, Object::Integer(18)));
    }
}
