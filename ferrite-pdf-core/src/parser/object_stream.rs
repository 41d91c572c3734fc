//! PDF Object Stream Parser
//!
//! Handles compressed objects stored in object streams (PDF 1.5+)

use super::lexer::{Lexer, Token};
use super::objects::{NoResolver, ObjectParser};
use super::source::SliceSource;
use super::ParseOptions;
use crate::error::{PdfError, Result};
use crate::objects::{Object, Stream};

/// Decoded contents of an object stream
#[derive(Debug, Clone)]
pub struct ObjectStream {
    /// `(object number, object)` in stream order
    objects: Vec<(u32, Object)>,
}

impl ObjectStream {
    /// Parse every object held by `stream`
    pub fn parse(stream: &Stream, options: ParseOptions) -> Result<Self> {
        let dict = stream.dictionary();
        let count = dict
            .get_integer("N")
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| PdfError::structure("object stream without /N"))?;
        let first = dict
            .get_integer("First")
            .and_then(|f| usize::try_from(f).ok())
            .ok_or_else(|| PdfError::structure("object stream without /First"))?;

        let data = stream.decode()?;
        let mut parser = ObjectParser::new(Lexer::new(SliceSource::new(&data)), options);

        // Each header pair takes at least four bytes ("n o ")
        let mut offsets = Vec::with_capacity(count.min(data.len() / 4));
        for _ in 0..count {
            let (position, token) = parser.next_positioned_token()?;
            let number = match token {
                Token::Integer(n) => u32::try_from(n).ok(),
                _ => None,
            };
            let offset = match parser.next_token()? {
                Token::Integer(o) => usize::try_from(o).ok(),
                _ => None,
            };
            match (number, offset) {
                (Some(number), Some(offset)) => offsets.push((number, offset)),
                _ => {
                    return Err(PdfError::syntax(
                        position,
                        "Expected object number and offset in object stream",
                    ));
                }
            }
        }

        let mut objects = Vec::with_capacity(offsets.len());
        for (number, offset) in offsets {
            parser.lexer_mut().seek(first.saturating_add(offset));
            let object = parser.parse_object(&mut NoResolver)?;
            objects.push((number, object));
        }

        Ok(Self { objects })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Object `number`, looked up at `index` first and by scanning otherwise.
    pub fn get(&self, number: u32, index: u32) -> Option<&Object> {
        match self.objects.get(index as usize) {
            Some((n, object)) if *n == number => Some(object),
            _ => self
                .objects
                .iter()
                .find(|(n, _)| *n == number)
                .map(|(_, object)| object),
        }
    }

    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.objects.iter().map(|(n, _)| *n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Dictionary, ObjectId};

    fn object_stream(header: &str, body: &str) -> Stream {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("ObjStm"));
        dict.set("N", header.split_whitespace().count() as i64 / 2);
        dict.set("First", header.len() as i64);
        Stream::with_dictionary(dict, format!("{header}{body}").into_bytes())
    }

    #[test]
    fn test_parse_object_stream() {
        let stream = object_stream("10 0 11 15 ", "<< /A 12 0 R >> [1 2]");
        let parsed = ObjectStream::parse(&stream, ParseOptions::default()).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed.get(10, 0).and_then(|o| o.as_dict()).and_then(|d| d.get("A")),
            Some(&Object::Reference(ObjectId::new(12, 0)))
        );
        assert_eq!(
            parsed.get(11, 1),
            Some(&Object::Array(vec![Object::Integer(1), Object::Integer(2)]))
        );
        assert_eq!(parsed.numbers().collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn test_lookup_with_wrong_index_falls_back() {
        let stream = object_stream("5 0 6 2 ", "7 8");
        let parsed = ObjectStream::parse(&stream, ParseOptions::default()).unwrap();
        assert_eq!(parsed.get(6, 0), Some(&Object::Integer(8)));
        assert_eq!(parsed.get(9, 0), None);
    }

    #[test]
    fn test_oversized_count_is_an_error() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("ObjStm"));
        dict.set("N", i64::MAX / 2);
        dict.set("First", 4);
        let stream = Stream::with_dictionary(dict, b"1 0 null".to_vec());

        let err = ObjectStream::parse(&stream, ParseOptions::default()).unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_missing_keys() {
        let stream = Stream::new(b"1 0 5".to_vec());
        assert!(ObjectStream::parse(&stream, ParseOptions::default()).is_err());
    }
}
