//! PDF Writer
//!
//! Two strategies: a standard write renumbers nothing but rewrites every
//! in-use object with a fresh cross-reference section; an incremental write
//! appends only modified objects after the original bytes.

mod serializer;
mod xref_stream_writer;

pub use serializer::{format_real, name_bytes, ObjectSerializer};
pub use xref_stream_writer::XRefStreamWriter;

use crate::error::{PdfError, Result};
use crate::file::PdfFile;
use crate::objects::{Dictionary, Object, ObjectId, StreamKind};
use crate::parser::{PdfVersion, XRefEntry};
use std::io::Write;

/// Decimal places used for reals unless configured otherwise
pub const DEFAULT_REAL_PRECISION: usize = 5;

/// Cross-reference output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XRefMode {
    /// Classic `xref` table with a `trailer` dictionary
    Table,
    /// Cross-reference stream (PDF 1.5+)
    #[default]
    Stream,
}

/// How a file is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationMode {
    /// Full rewrite
    Standard,
    /// Original bytes followed by an update section
    Incremental,
}

/// Configuration for PDF writer
#[derive(Debug, Clone, PartialEq)]
pub struct WriterConfig {
    /// Decimal places for real numbers
    pub real_precision: usize,
    pub xref_mode: XRefMode,
    /// Apply FlateDecode to xref streams
    pub compress_xref_stream: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            real_precision: DEFAULT_REAL_PRECISION,
            xref_mode: XRefMode::default(),
            compress_xref_stream: cfg!(feature = "compression"),
        }
    }
}

pub struct PdfWriter<W: Write> {
    writer: W,
    position: u64,
    config: WriterConfig,
    serializer: ObjectSerializer,
}

impl<W: Write> PdfWriter<W> {
    pub fn new(writer: W, config: WriterConfig) -> Self {
        let serializer = ObjectSerializer::new(config.real_precision);
        Self {
            writer,
            position: 0,
            config,
            serializer,
        }
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    /// `%PDF-x.y` and a binary marker comment
    pub fn write_header(&mut self, version: PdfVersion) -> Result<()> {
        self.write_bytes(format!("%PDF-{version}\n").as_bytes())?;
        self.write_bytes(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n'])
    }

    /// Writes `N G obj ... endobj` and returns the offset of its first byte.
    pub fn write_indirect(&mut self, id: ObjectId, object: &Object) -> Result<u64> {
        let offset = self.position;
        let mut out = format!("{} {} obj\n", id.number(), id.generation()).into_bytes();
        self.serializer.write_object(&mut out, object);
        out.extend_from_slice(b"\nendobj\n");
        self.write_bytes(&out)?;
        Ok(offset)
    }

    /// Rewrites every in-use object of `file`, in object number order.
    pub fn write_standard(&mut self, file: &mut PdfFile) -> Result<()> {
        let mut version = file.version();
        if self.config.xref_mode == XRefMode::Stream && version < PdfVersion::V1_5 {
            tracing::debug!("Raising version {} to 1.5 for the xref stream", version);
            version = PdfVersion::V1_5;
        }
        if !file.trailer().contains_key("Root") {
            tracing::warn!("Writing a file whose trailer has no /Root");
        }
        self.write_header(version)?;

        let lenient = file.objects().options().lenient;
        let last = file.objects().last_object_number();
        let known =
            file.objects().original_entries().len() + file.objects().modified_numbers().count();
        let mut entries = Vec::with_capacity(known.min(last as usize) + 2);
        entries.push(XRefEntry::free(0, 0, XRefEntry::UNREUSABLE_GENERATION));

        for number in 1..=last {
            match file.objects().xref_entry(number) {
                Some(entry) if !entry.is_free() => {}
                Some(entry) => {
                    entries.push(XRefEntry::free(number, 0, entry.generation));
                    continue;
                }
                None => {
                    entries.push(XRefEntry::free(number, 0, 0));
                    continue;
                }
            }

            let object = match file.objects_mut().resolve(number) {
                Ok(Some(object)) => object,
                Ok(None) => {
                    entries.push(XRefEntry::free(number, 0, 0));
                    continue;
                }
                Err(e) if lenient => {
                    tracing::warn!("Dropping unreadable object {}: {}", number, e);
                    entries.push(XRefEntry::free(number, 0, XRefEntry::UNREUSABLE_GENERATION));
                    continue;
                }
                Err(e) => return Err(e),
            };

            // A new xref section replaces these; their contents are written out
            // as regular objects
            if let Object::Stream(stream) = object.data() {
                if stream.kind() != StreamKind::Generic {
                    tracing::debug!("Suppressing {:?} object {}", stream.kind(), number);
                    entries.push(XRefEntry::free(number, 0, XRefEntry::UNREUSABLE_GENERATION));
                    continue;
                }
            }

            let generation = object.generation();
            let offset = self.write_indirect(ObjectId::new(number, generation), object.data())?;
            entries.push(XRefEntry::in_use(number, offset, generation));
        }

        link_free_entries(&mut entries);
        tracing::debug!("Wrote {} objects", entries.iter().filter(|e| !e.is_free()).count());
        let mode = self.config.xref_mode;
        self.write_xref(entries, file.trailer(), last, None, mode)
    }

    /// Appends modified objects and a cross-reference section chained to the
    /// original through `/Prev`.
    pub fn write_incremental(&mut self, file: &mut PdfFile) -> Result<()> {
        let prev = file.startxref().ok_or_else(|| {
            PdfError::usage("Incremental save needs a file loaded from existing PDF data")
        })?;
        let source = file.objects().source().ok_or_else(|| {
            PdfError::usage("Incremental save needs a file loaded from existing PDF data")
        })?;
        self.write_bytes(source)?;

        let numbers: Vec<u32> = file.objects().modified_numbers().collect();
        if numbers.is_empty() {
            tracing::debug!("Nothing modified; original bytes written unchanged");
            return Ok(());
        }
        if !matches!(source.last(), Some(b'\n' | b'\r')) {
            self.write_bytes(b"\n")?;
        }

        let mut entries = Vec::with_capacity(numbers.len() + 2);
        for number in numbers {
            let Some(object) = file.objects().modified(number) else {
                continue;
            };
            if object.is_in_use() {
                let offset = self.write_indirect(object.id(), object.data())?;
                entries.push(XRefEntry::in_use(number, offset, object.generation()));
            } else {
                entries.push(XRefEntry::free(number, 0, object.generation()));
            }
        }
        if entries.iter().any(XRefEntry::is_free) {
            entries.insert(0, XRefEntry::free(0, 0, XRefEntry::UNREUSABLE_GENERATION));
            link_free_entries(&mut entries);
        }

        let mut mode = self.config.xref_mode;
        if mode == XRefMode::Stream && file.version() < PdfVersion::V1_5 {
            tracing::debug!("Using an xref table for a PDF {} update", file.version());
            mode = XRefMode::Table;
        }
        tracing::debug!("Appending update with {} entries", entries.len());
        let last = file.objects().last_object_number();
        self.write_xref(entries, file.trailer(), last, Some(prev), mode)
    }

    /// Writes the cross-reference section for `entries` (sorted by number),
    /// the trailer and the `startxref` tail. `last` is the highest object
    /// number in use by the file.
    fn write_xref(
        &mut self,
        entries: Vec<XRefEntry>,
        trailer: &Dictionary,
        last: u32,
        prev: Option<u64>,
        mode: XRefMode,
    ) -> Result<()> {
        let size = trailer_size(trailer, last);
        match mode {
            XRefMode::Table => {
                let start = self.position;
                self.write_xref_table(&entries)?;
                let trailer = output_trailer(trailer, size, prev);
                let mut out = b"trailer\n".to_vec();
                self.serializer
                    .write_object(&mut out, &Object::Dictionary(trailer));
                out.push(b'\n');
                self.write_bytes(&out)?;
                self.write_tail(start)
            }
            XRefMode::Stream => {
                let stream_number = size;
                let offset = self.position;
                let mut writer = XRefStreamWriter::new();
                for entry in entries {
                    writer.add_entry(entry);
                }
                writer.add_entry(XRefEntry::in_use(stream_number, offset, 0));
                let stream = writer.build_stream(
                    stream_number + 1,
                    trailer,
                    prev,
                    self.config.compress_xref_stream,
                )?;
                self.write_indirect(ObjectId::new(stream_number, 0), &Object::Stream(stream))?;
                self.write_tail(offset)
            }
        }
    }

    fn write_xref_table(&mut self, entries: &[XRefEntry]) -> Result<()> {
        let mut out = b"xref\n".to_vec();
        let mut remaining = entries;
        for (first, count) in xref_stream_writer::subsections(entries) {
            out.extend_from_slice(format!("{first} {count}\n").as_bytes());
            let (group, rest) = remaining.split_at(count as usize);
            for entry in group {
                let line = if entry.is_free() {
                    format!("{:010} {:05} f \n", entry.offset, entry.generation)
                } else {
                    format!("{:010} {:05} n \n", entry.offset, entry.generation)
                };
                out.extend_from_slice(line.as_bytes());
            }
            remaining = rest;
        }
        self.write_bytes(&out)
    }

    fn write_tail(&mut self, startxref: u64) -> Result<()> {
        self.write_bytes(format!("startxref\n{startxref}\n%%EOF\n").as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// `/Size`: one past the highest object number, or the declared size when
/// that is larger.
fn trailer_size(trailer: &Dictionary, last: u32) -> u32 {
    let declared = trailer
        .get_integer("Size")
        .and_then(|s| u32::try_from(s).ok())
        .unwrap_or(0);
    declared.max(last + 1)
}

fn output_trailer(trailer: &Dictionary, size: u32, prev: Option<u64>) -> Dictionary {
    let mut out = Dictionary::with_capacity(trailer.len() + 2);
    out.set("Size", size);
    for (key, value) in trailer.iter() {
        if !matches!(key.as_str(), "Size" | "Prev" | "XRefStm") {
            out.set(key.clone(), value.clone());
        }
    }
    if let Some(prev) = prev {
        out.set("Prev", prev as i64);
    }
    out
}

/// Threads the free entries of sorted `entries` into a list: entry 0 points
/// at the lowest free number, each free entry at the next, the last back to 0.
pub(crate) fn link_free_entries(entries: &mut [XRefEntry]) {
    let free: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_free())
        .map(|(i, _)| i)
        .collect();
    for (k, &i) in free.iter().enumerate() {
        let next = free
            .get(k + 1)
            .map_or(0, |&j| entries[j].number);
        entries[i].offset = u64::from(next);
    }
}
