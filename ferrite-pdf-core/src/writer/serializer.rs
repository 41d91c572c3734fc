//! PDF syntax for direct objects
//!
//! Everything here writes into a byte vector; the caller decides where the
//! bytes go so that offsets stay exact.

use crate::objects::{Dictionary, Object, PdfString, Stream, StringFormat};
use crate::parser::lexer::is_delimiter;

/// Serializes objects with a fixed real-number precision
#[derive(Debug, Clone, Copy)]
pub struct ObjectSerializer {
    precision: usize,
}

impl ObjectSerializer {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }

    /// `object` in PDF syntax
    pub fn to_bytes(&self, object: &Object) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_object(&mut out, object);
        out
    }

    pub fn write_object(&self, out: &mut Vec<u8>, object: &Object) {
        match object {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => out.extend_from_slice(format_real(*r, self.precision).as_bytes()),
            Object::String(s) => write_string(out, s),
            Object::Name(name) => write_name(out, name),
            Object::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    self.write_object(out, item);
                }
                out.push(b']');
            }
            Object::Dictionary(dict) => self.write_dictionary(out, dict, None),
            Object::Stream(stream) => self.write_stream(out, stream),
            Object::Reference(id) => {
                out.extend_from_slice(format!("{} {} R", id.number(), id.generation()).as_bytes())
            }
        }
    }

    /// Writes `dict`; with `length` set, `/Length` is forced to that value
    /// and appended when missing.
    fn write_dictionary(&self, out: &mut Vec<u8>, dict: &Dictionary, length: Option<usize>) {
        out.extend_from_slice(b"<<");
        let mut wrote_length = false;
        for (key, value) in dict.iter() {
            out.push(b' ');
            write_name(out, key);
            out.push(b' ');
            match length {
                Some(len) if key == "Length" => {
                    out.extend_from_slice(len.to_string().as_bytes());
                    wrote_length = true;
                }
                _ => self.write_object(out, value),
            }
        }
        if let (Some(len), false) = (length, wrote_length) {
            out.extend_from_slice(format!(" /Length {len}").as_bytes());
        }
        out.extend_from_slice(b" >>");
    }

    fn write_stream(&self, out: &mut Vec<u8>, stream: &Stream) {
        let body = stream.data();
        self.write_dictionary(out, stream.dictionary(), Some(body.len()));
        out.extend_from_slice(b"\nstream\n");
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendstream");
    }
}

impl Default for ObjectSerializer {
    fn default() -> Self {
        Self::new(super::DEFAULT_REAL_PRECISION)
    }
}

/// Fixed-point text for `value`, trailing zeros trimmed down to one decimal.
pub fn format_real(value: f64, precision: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let mut text = format!("{value:.precision$}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').len();
        text.truncate(trimmed);
        if text.ends_with('.') {
            text.push('0');
        }
    }
    if text.starts_with('-') && text[1..].bytes().all(|b| b == b'0' || b == b'.') {
        text.remove(0);
    }
    text
}

fn write_string(out: &mut Vec<u8>, string: &PdfString) {
    match string.format() {
        StringFormat::Literal => {
            out.push(b'(');
            for &b in string.as_bytes() {
                match b {
                    b'(' | b')' | b'\\' => {
                        out.push(b'\\');
                        out.push(b);
                    }
                    b'\r' => out.extend_from_slice(b"\\r"),
                    _ => out.push(b),
                }
            }
            out.push(b')');
        }
        StringFormat::Hex => {
            out.push(b'<');
            for &b in string.as_bytes() {
                out.extend_from_slice(format!("{b:02X}").as_bytes());
            }
            out.push(b'>');
        }
    }
}

/// Raw bytes of a name. Chars up to U+00FF are single bytes, as the lexer
/// produces them; anything wider falls back to its UTF-8 encoding.
pub fn name_bytes(name: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(name.len());
    for ch in name.chars() {
        match u8::try_from(ch) {
            Ok(b) => bytes.push(b),
            Err(_) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    bytes
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for b in name_bytes(name) {
        if b < 0x21 || b > 0x7E || b == b'#' || is_delimiter(b) {
            out.extend_from_slice(format!("#{b:02X}").as_bytes());
        } else {
            out.push(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectId;
    use crate::parser::{Lexer, NoResolver, ObjectParser, ParseOptions, SliceSource};

    fn text(object: &Object) -> String {
        String::from_utf8(ObjectSerializer::new(5).to_bytes(object)).unwrap()
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(1.5, 5), "1.5");
        assert_eq!(format_real(2.0, 5), "2.0");
        assert_eq!(format_real(0.123456789, 5), "0.12346");
        assert_eq!(format_real(-0.000001, 5), "0.0");
        assert_eq!(format_real(f64::NAN, 5), "0.0");
        assert_eq!(format_real(1e20, 2), "100000000000000000000.0");
        assert_eq!(format_real(3.7, 0), "4");
    }

    #[test]
    fn test_primitives() {
        assert_eq!(text(&Object::Null), "null");
        assert_eq!(text(&Object::Boolean(false)), "false");
        assert_eq!(text(&Object::Integer(-42)), "-42");
        assert_eq!(text(&Object::Reference(ObjectId::new(12, 3))), "12 3 R");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(text(&Object::from("a(b)\\c\r")), "(a\\(b\\)\\\\c\\r)");
        let hex = Object::String(PdfString::hex(vec![0xAB, 0x01]));
        assert_eq!(text(&hex), "<AB01>");
    }

    #[test]
    fn test_name_escapes() {
        assert_eq!(text(&Object::name("Type")), "/Type");
        assert_eq!(text(&Object::name("A B#(")), "/A#20B#23#28");
        assert_eq!(text(&Object::name("\u{20ac}")), "/#E2#82#AC");
    }

    #[test]
    fn test_name_bytes_survive_reparse() {
        let source = b"<< /Font << /caf#E9 5 0 R /caf#C3#A9 6 0 R >> >>";
        let mut parser = ObjectParser::new(
            Lexer::new(SliceSource::new(source)),
            ParseOptions::default(),
        );
        let object = parser.parse_object(&mut NoResolver).unwrap();
        assert_eq!(
            text(&object),
            "<< /Font << /caf#E9 5 0 R /caf#C3#A9 6 0 R >> >>"
        );
        assert_eq!(name_bytes("caf\u{e9}"), b"caf\xE9");
    }

    #[test]
    fn test_containers() {
        let mut dict = Dictionary::new();
        dict.set("Kids", vec![Object::Integer(1), Object::Real(0.5)]);
        dict.set("Count", 2);
        assert_eq!(
            text(&Object::Dictionary(dict)),
            "<< /Kids [1 0.5] /Count 2 >>"
        );
        assert_eq!(text(&Object::Dictionary(Dictionary::new())), "<< >>");
    }

    #[test]
    fn test_stream_length_is_rewritten() {
        let mut dict = Dictionary::new();
        dict.set("Length", ObjectId::new(9, 0));
        dict.set("Filter", Object::name("ASCIIHexDecode"));
        let stream = Stream::from_parts(dict, b"414243>".to_vec().into());
        assert_eq!(
            text(&Object::Stream(stream)),
            "<< /Length 7 /Filter /ASCIIHexDecode >>\nstream\n414243>\nendstream"
        );

        let bare = Stream::from_parts(Dictionary::new(), b"xy".to_vec().into());
        assert_eq!(
            text(&Object::Stream(bare)),
            "<< /Length 2 >>\nstream\nxy\nendstream"
        );
    }
}
