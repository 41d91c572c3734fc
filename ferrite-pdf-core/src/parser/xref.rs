//! PDF Cross-Reference Parser
//!
//! Reads classic xref tables (ISO 32000-1 Section 7.5.4) and xref streams
//! (Section 7.5.8), following `/Prev` and `/XRefStm` links back through
//! every incremental update.

use super::lexer::{Lexer, Token};
use super::objects::{NoResolver, ObjectParser};
use super::source::SliceSource;
use super::ParseOptions;
use crate::buffer::ByteBuffer;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, StreamKind};
use std::collections::{BTreeMap, HashSet};

/// How an object number is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefUsage {
    Free,
    InUse,
    /// Stored inside an object stream
    InUseCompressed,
}

/// Cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    pub number: u32,
    pub generation: u16,
    pub usage: XRefUsage,
    /// Byte offset for in-use entries, next free object number for free
    /// entries, containing object stream number for compressed entries
    pub offset: u64,
    /// Index inside the object stream (compressed entries only)
    pub stream_index: u32,
}

impl XRefEntry {
    /// Generation given to freed numbers so they are never handed out again
    pub const UNREUSABLE_GENERATION: u16 = 65535;

    pub fn free(number: u32, next_free: u32, generation: u16) -> Self {
        Self {
            number,
            generation,
            usage: XRefUsage::Free,
            offset: u64::from(next_free),
            stream_index: 0,
        }
    }

    pub fn in_use(number: u32, offset: u64, generation: u16) -> Self {
        Self {
            number,
            generation,
            usage: XRefUsage::InUse,
            offset,
            stream_index: 0,
        }
    }

    pub fn compressed(number: u32, stream_number: u32, stream_index: u32) -> Self {
        Self {
            number,
            generation: 0,
            usage: XRefUsage::InUseCompressed,
            offset: u64::from(stream_number),
            stream_index,
        }
    }

    pub fn is_free(&self) -> bool {
        self.usage == XRefUsage::Free
    }

    pub fn next_free(&self) -> u32 {
        self.offset as u32
    }

    pub fn stream_number(&self) -> u32 {
        self.offset as u32
    }
}

/// One xref section with its trailer
#[derive(Debug, Clone)]
pub struct XRefSection {
    pub entries: Vec<XRefEntry>,
    pub trailer: Dictionary,
    pub is_stream: bool,
}

/// Merged cross-reference information of a whole file
#[derive(Debug, Clone)]
pub struct XRefIndex {
    /// Newest entry for every listed object number
    pub entries: BTreeMap<u32, XRefEntry>,
    /// Newest trailer, with xref bookkeeping keys removed
    pub trailer: Dictionary,
    /// Offset of the newest xref section
    pub startxref: u64,
    /// Highest object number the file declares
    pub last_object_number: u32,
}

/// Keys describing an xref section rather than the document
const SECTION_KEYS: &[&str] = &[
    "Type",
    "W",
    "Index",
    "Filter",
    "DecodeParms",
    "Length",
    "DL",
    "Prev",
    "XRefStm",
];

/// Locate `startxref` in the last 1024 bytes and read the offset after it.
pub fn find_startxref(data: &[u8]) -> Result<u64> {
    let tail_start = data.len().saturating_sub(1024);
    let tail = &data[tail_start..];
    let keyword = b"startxref";
    let found = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or_else(|| PdfError::structure("startxref not found"))?;

    let position = tail_start + found + keyword.len();
    let mut lexer = Lexer::for_content(SliceSource::at(data, position));
    match lexer.next_token()? {
        Token::Integer(offset) if offset >= 0 => Ok(offset as u64),
        other => Err(PdfError::syntax(
            position,
            format!("Expected xref offset after startxref, found {other:?}"),
        )),
    }
}

/// Read the xref section (table or stream) at `offset`.
pub fn read_section(data: &[u8], offset: u64, options: ParseOptions) -> Result<XRefSection> {
    let offset = usize::try_from(offset)
        .ok()
        .filter(|&o| o < data.len())
        .ok_or_else(|| PdfError::structure(format!("xref offset {offset} beyond end of file")))?;

    let mut parser = ObjectParser::new(Lexer::new(SliceSource::at(data, offset)), options);
    if parser.lexer_mut().peek_token()?.is_keyword("xref") {
        parser.next_token()?;
        read_table(&mut parser)
    } else {
        read_stream_section(&mut parser)
    }
}

fn read_table(parser: &mut ObjectParser<SliceSource<'_>>) -> Result<XRefSection> {
    let mut entries = Vec::new();

    loop {
        let (position, token) = parser.next_positioned_token()?;
        let first = match token {
            Token::Keyword(k) if k == "trailer" => break,
            Token::Integer(first) => u32::try_from(first).ok(),
            _ => None,
        };
        let count = match parser.next_token()? {
            Token::Integer(count) => u32::try_from(count).ok(),
            _ => None,
        };
        let (Some(first), Some(count)) = (first, count) else {
            return Err(PdfError::syntax(position, "Invalid xref subsection header"));
        };

        for i in 0..count {
            let (position, token) = parser.next_positioned_token()?;
            let offset = match token {
                Token::Integer(offset) => u64::try_from(offset).ok(),
                _ => None,
            };
            let generation = match parser.next_token()? {
                Token::Integer(g) => u16::try_from(g).ok(),
                _ => None,
            };
            let usage = parser.next_token()?;
            let number = first.saturating_add(i);
            let entry = match (offset, generation, usage) {
                (Some(offset), Some(generation), Token::Keyword(k)) if k == "n" => {
                    XRefEntry::in_use(number, offset, generation)
                }
                (Some(offset), Some(generation), Token::Keyword(k)) if k == "f" => {
                    XRefEntry::free(number, offset as u32, generation)
                }
                _ => return Err(PdfError::syntax(position, "Invalid xref entry")),
            };
            entries.push(entry);
        }
    }

    let position = parser.lexer().position();
    let trailer = match parser.parse_object(&mut NoResolver)? {
        Object::Dictionary(dict) => dict,
        other => {
            return Err(PdfError::syntax(
                position,
                format!("Trailer must be a dictionary, found {}", other.type_name()),
            ));
        }
    };

    Ok(XRefSection {
        entries,
        trailer,
        is_stream: false,
    })
}

fn read_stream_section(parser: &mut ObjectParser<SliceSource<'_>>) -> Result<XRefSection> {
    let position = parser.lexer().position();
    let (id, object) = parser.parse_indirect_object(&mut NoResolver)?;
    let stream = match object {
        Object::Stream(stream) if stream.kind() == StreamKind::XRefStream => stream,
        other => {
            return Err(PdfError::structure(format!(
                "Object {} at offset {} is a {}, not an xref stream",
                id.number(),
                position,
                other.type_name()
            )));
        }
    };

    let dict = stream.dictionary();
    let widths = read_widths(dict)?;
    let size = dict
        .get_integer("Size")
        .and_then(|s| u32::try_from(s).ok())
        .ok_or_else(|| PdfError::structure("xref stream without /Size"))?;
    let index = read_index(dict, size)?;

    let mut body = ByteBuffer::from(stream.decode()?);
    let mut entries = Vec::new();
    for (first, count) in index {
        for i in 0..count {
            let number = first.saturating_add(i);
            let kind = if widths[0] == 0 {
                1
            } else {
                body.read_uint(widths[0])?
            };
            let field2 = body.read_uint(widths[1])?;
            let field3 = body.read_uint(widths[2])?;

            let entry = match kind {
                0 => XRefEntry::free(number, field2 as u32, field3 as u16),
                1 => XRefEntry::in_use(number, field2, field3 as u16),
                2 => XRefEntry::compressed(number, field2 as u32, field3 as u32),
                other => {
                    tracing::warn!("Unknown xref entry type {} for object {}", other, number);
                    XRefEntry::free(number, 0, 0)
                }
            };
            entries.push(entry);
        }
    }

    let (trailer, _) = stream.into_parts();
    Ok(XRefSection {
        entries,
        trailer,
        is_stream: true,
    })
}

fn read_widths(dict: &Dictionary) -> Result<[usize; 3]> {
    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|w| w.as_integer().and_then(|w| usize::try_from(w).ok()))
                .collect()
        })
        .unwrap_or_default();
    match widths.as_slice() {
        [0, 0, 0] => Err(PdfError::structure("xref stream /W has no non-zero width")),
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(PdfError::structure("xref stream /W must hold three widths")),
    }
}

fn read_index(dict: &Dictionary, size: u32) -> Result<Vec<(u32, u32)>> {
    let Some(index) = dict.get("Index") else {
        return Ok(vec![(0, size)]);
    };
    let values: Vec<u32> = index
        .as_array()
        .ok_or_else(|| PdfError::structure("xref stream /Index must be an array"))?
        .iter()
        .map(|v| {
            v.as_integer()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| PdfError::structure("xref stream /Index values must be integers"))
        })
        .collect::<Result<_>>()?;
    if values.len() % 2 != 0 {
        return Err(PdfError::structure(
            "xref stream /Index must hold pairs of integers",
        ));
    }
    Ok(values.chunks(2).map(|pair| (pair[0], pair[1])).collect())
}

/// Read every xref section reachable from `startxref` and merge them,
/// newest first.
pub fn load_xref(data: &[u8], options: ParseOptions) -> Result<XRefIndex> {
    let startxref = find_startxref(data)?;
    let mut entries: BTreeMap<u32, XRefEntry> = BTreeMap::new();
    let mut trailer: Option<Dictionary> = None;
    let mut declared_size = 0u32;
    let mut visited = HashSet::new();
    let mut next = Some(startxref);

    while let Some(offset) = next {
        if !visited.insert(offset) {
            tracing::warn!("xref chain loops back to offset {}", offset);
            break;
        }
        let section = read_section(data, offset, options)?;
        tracing::debug!(
            "Read {} xref section at {} with {} entries",
            if section.is_stream { "stream" } else { "table" },
            offset,
            section.entries.len()
        );

        // Hybrid files: the companion stream lists the compressed objects
        // and takes precedence over this section's table
        if let Some(stm) = section.trailer.get_integer("XRefStm") {
            let stm = stm as u64;
            if visited.insert(stm) {
                let companion = read_section(data, stm, options)?;
                for entry in companion.entries {
                    entries.entry(entry.number).or_insert(entry);
                }
            }
        }
        for entry in &section.entries {
            entries.entry(entry.number).or_insert(*entry);
        }

        if let Some(size) = section.trailer.get_integer("Size") {
            declared_size = declared_size.max(u32::try_from(size).unwrap_or(0));
        }
        next = section
            .trailer
            .get_integer("Prev")
            .and_then(|prev| u64::try_from(prev).ok());
        if trailer.is_none() {
            trailer = Some(section.trailer);
        }
    }

    let mut trailer = trailer.unwrap_or_default();
    for key in SECTION_KEYS {
        trailer.remove(key);
    }

    entries
        .entry(0)
        .or_insert_with(|| XRefEntry::free(0, 0, XRefEntry::UNREUSABLE_GENERATION));

    let highest_listed = entries.keys().next_back().copied().unwrap_or(0);
    // Every object costs at least a byte, so a /Size past the file length is bogus
    if declared_size as usize > data.len() {
        tracing::warn!(
            "Ignoring /Size {} larger than the {}-byte file",
            declared_size,
            data.len()
        );
        declared_size = 0;
    }
    let last_object_number = highest_listed.max(declared_size.saturating_sub(1));

    Ok(XRefIndex {
        entries,
        trailer,
        startxref,
        last_object_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSIC: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog >>\nendobj\n\
xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \n\
trailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n45\n%%EOF\n";

    #[test]
    fn test_find_startxref() {
        assert_eq!(find_startxref(CLASSIC).unwrap(), 45);
        assert!(find_startxref(b"%PDF-1.4\nno trailer").is_err());
    }

    #[test]
    fn test_read_classic_section() {
        let section = read_section(CLASSIC, 45, ParseOptions::default()).unwrap();
        assert!(!section.is_stream);
        assert_eq!(
            section.entries,
            vec![
                XRefEntry::free(0, 0, 65535),
                XRefEntry::in_use(1, 9, 0),
            ]
        );
        assert_eq!(section.trailer.get_integer("Size"), Some(2));
    }

    #[test]
    fn test_load_classic() {
        let index = load_xref(CLASSIC, ParseOptions::default()).unwrap();
        assert_eq!(index.startxref, 45);
        assert_eq!(index.last_object_number, 1);
        assert_eq!(index.entries.len(), 2);
        assert!(index.trailer.contains_key("Root"));
    }

    #[test]
    fn test_entry_constructors() {
        let entry = XRefEntry::compressed(7, 3, 2);
        assert_eq!(entry.usage, XRefUsage::InUseCompressed);
        assert_eq!(entry.stream_number(), 3);
        assert_eq!(entry.stream_index, 2);

        let free = XRefEntry::free(4, 9, 1);
        assert!(free.is_free());
        assert_eq!(free.next_free(), 9);
    }

    #[test]
    fn test_read_index_and_widths() {
        let mut dict = Dictionary::new();
        dict.set("W", vec![Object::Integer(1), Object::Integer(2), Object::Integer(1)]);
        dict.set(
            "Index",
            vec![
                Object::Integer(0),
                Object::Integer(1),
                Object::Integer(5),
                Object::Integer(2),
            ],
        );
        assert_eq!(read_widths(&dict).unwrap(), [1, 2, 1]);
        assert_eq!(read_index(&dict, 10).unwrap(), vec![(0, 1), (5, 2)]);

        dict.remove("Index");
        assert_eq!(read_index(&dict, 10).unwrap(), vec![(0, 10)]);

        dict.set("W", vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)]);
        assert!(read_widths(&dict).is_err());
    }

    #[test]
    fn test_read_uncompressed_xref_stream() {
        // Entries: 0 free, 1 at offset 9, 2 compressed in 1 at index 0
        let body: Vec<u8> = vec![0, 0, 0, 255, 1, 0, 9, 0, 2, 0, 1, 0];
        let mut data = b"%PDF-1.5\n".to_vec();
        let xref_offset = data.len();
        data.extend_from_slice(
            format!(
                "3 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Length {} >>\nstream\n",
                body.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(&body);
        data.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{xref_offset}\n%%EOF").as_bytes());

        let index = load_xref(&data, ParseOptions::default()).unwrap();
        assert_eq!(index.entries[&0].usage, XRefUsage::Free);
        assert_eq!(index.entries[&0].generation, 255);
        assert_eq!(index.entries[&1], XRefEntry::in_use(1, 9, 0));
        assert_eq!(index.entries[&2], XRefEntry::compressed(2, 1, 0));
        assert!(index.trailer.contains_key("Root"));
        assert!(!index.trailer.contains_key("W"));
        assert!(!index.trailer.contains_key("Type"));
    }

    #[test]
    fn test_prev_chain_newest_wins() {
        let mut data = b"%PDF-1.4\n".to_vec();
        let first = data.len();
        data.extend_from_slice(
            b"xref\n0 2\n0000000000 65535 f \n0000000100 00000 n \ntrailer\n<< /Size 2 >>\n",
        );
        let second = data.len();
        data.extend_from_slice(
            format!(
                "xref\n1 1\n0000000200 00000 n \ntrailer\n<< /Size 2 /Prev {first} >>\nstartxref\n{second}\n%%EOF"
            )
            .as_bytes(),
        );

        let index = load_xref(&data, ParseOptions::default()).unwrap();
        assert_eq!(index.entries[&1].offset, 200);
        assert_eq!(index.startxref, second as u64);
        assert!(!index.trailer.contains_key("Prev"));
    }

    #[test]
    fn test_prev_loop_is_cut() {
        let mut data = b"%PDF-1.4\n".to_vec();
        let offset = data.len();
        data.extend_from_slice(
            format!(
                "xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev {offset} >>\nstartxref\n{offset}\n%%EOF"
            )
            .as_bytes(),
        );
        let index = load_xref(&data, ParseOptions::default()).unwrap();
        assert_eq!(index.entries.len(), 1);
    }

    #[test]
    fn test_missing_entry_zero_is_synthesized() {
        let mut data = b"%PDF-1.4\n".to_vec();
        let offset = data.len();
        data.extend_from_slice(
            format!("xref\n3 1\n0000000009 00000 n \ntrailer\n<< /Size 4 >>\nstartxref\n{offset}\n%%EOF")
                .as_bytes(),
        );
        let index = load_xref(&data, ParseOptions::default()).unwrap();
        assert_eq!(index.entries[&0], XRefEntry::free(0, 0, 65535));
        assert!(!index.entries.contains_key(&1));
        assert_eq!(index.last_object_number, 3);
    }

    #[test]
    fn test_oversized_size_is_ignored() {
        let mut data = b"%PDF-1.4\n".to_vec();
        let offset = data.len();
        data.extend_from_slice(
            format!(
                "xref\n0 2\n0000000000 65535 f \n0000000009 00000 n \ntrailer\n<< /Size 4000000000 >>\nstartxref\n{offset}\n%%EOF"
            )
            .as_bytes(),
        );
        let index = load_xref(&data, ParseOptions::default()).unwrap();
        assert_eq!(index.last_object_number, 1);
    }
}
