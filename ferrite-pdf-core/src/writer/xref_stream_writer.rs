//! XRef Stream Writer for PDF 1.5+
//!
//! Builds cross-reference streams according to ISO 32000-1:2008
//! Section 7.5.8. Field widths are sized to the largest value written.

use crate::error::Result;
use crate::objects::{Dictionary, Object, Stream};
use crate::parser::{XRefEntry, XRefUsage};

/// Writer for XRef streams
#[derive(Debug, Default)]
pub struct XRefStreamWriter {
    /// Entries sorted by object number
    entries: Vec<XRefEntry>,
    /// Field widths [type, field2, field3]
    widths: [usize; 3],
}

impl XRefStreamWriter {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            widths: [1, 1, 1],
        }
    }

    /// Add an entry. Entries must arrive in ascending object number order.
    pub fn add_entry(&mut self, entry: XRefEntry) {
        let (field2, field3) = Self::fields(&entry);
        self.widths[1] = self.widths[1].max(Self::bytes_needed(field2));
        self.widths[2] = self.widths[2].max(Self::bytes_needed(field3));
        self.entries.push(entry);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn widths(&self) -> [usize; 3] {
        self.widths
    }

    fn fields(entry: &XRefEntry) -> (u64, u64) {
        match entry.usage {
            XRefUsage::Free | XRefUsage::InUse => (entry.offset, u64::from(entry.generation)),
            XRefUsage::InUseCompressed => (entry.offset, u64::from(entry.stream_index)),
        }
    }

    /// Calculate minimum bytes needed to represent a value
    fn bytes_needed(value: u64) -> usize {
        if value == 0 {
            1
        } else {
            ((value.ilog2() / 8) + 1) as usize
        }
    }

    /// Encode entries into binary data
    pub fn encode_entries(&self) -> Vec<u8> {
        let row = self.widths.iter().sum::<usize>();
        let mut data = Vec::with_capacity(row * self.entries.len());

        for entry in &self.entries {
            let kind = match entry.usage {
                XRefUsage::Free => 0,
                XRefUsage::InUse => 1,
                XRefUsage::InUseCompressed => 2,
            };
            let (field2, field3) = Self::fields(entry);
            Self::write_field(&mut data, kind, self.widths[0]);
            Self::write_field(&mut data, field2, self.widths[1]);
            Self::write_field(&mut data, field3, self.widths[2]);
        }

        data
    }

    /// Write a field with the specified width
    fn write_field(data: &mut Vec<u8>, value: u64, width: usize) {
        for i in (0..width).rev() {
            data.push(((value >> (i * 8)) & 0xFF) as u8);
        }
    }

    /// Contiguous runs of object numbers as `(first, count)` pairs
    pub fn subsections(&self) -> Vec<(u32, u32)> {
        subsections(&self.entries)
    }

    /// Stream object carrying the entries. `trailer` supplies the document
    /// keys (`Root`, `Info`, `ID`, ...).
    pub fn build_stream(
        &self,
        size: u32,
        trailer: &Dictionary,
        prev_xref: Option<u64>,
        compress: bool,
    ) -> Result<Stream> {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("XRef"));
        dict.set("Size", size);
        for (key, value) in trailer.iter() {
            if !matches!(key.as_str(), "Size" | "Prev" | "XRefStm") {
                dict.set(key.clone(), value.clone());
            }
        }
        if let Some(prev) = prev_xref {
            dict.set("Prev", prev as i64);
        }
        dict.set(
            "W",
            self.widths
                .iter()
                .map(|w| Object::Integer(*w as i64))
                .collect::<Vec<_>>(),
        );

        // Index defaults to [0 Size]
        let groups = self.subsections();
        if groups != [(0, size)] {
            let index = groups
                .iter()
                .flat_map(|&(first, count)| [Object::from(first), Object::from(count)])
                .collect::<Vec<_>>();
            dict.set("Index", index);
        }

        let data = self.encode_entries();
        let mut stream = Stream::with_dictionary(dict, Vec::new());
        if compress {
            Self::compress_into(&mut stream, &data)?;
        } else {
            stream.set_data(data);
        }
        Ok(stream)
    }

    #[cfg(feature = "compression")]
    fn compress_into(stream: &mut Stream, data: &[u8]) -> Result<()> {
        stream.set_compressed_data(data)
    }

    #[cfg(not(feature = "compression"))]
    fn compress_into(stream: &mut Stream, data: &[u8]) -> Result<()> {
        tracing::warn!("xref stream compression requested without the 'compression' feature");
        stream.set_data(data.to_vec());
        Ok(())
    }
}

/// Contiguous runs of object numbers in sorted `entries`
pub(crate) fn subsections(entries: &[XRefEntry]) -> Vec<(u32, u32)> {
    let mut groups: Vec<(u32, u32)> = Vec::new();
    for entry in entries {
        match groups.last_mut() {
            Some((first, count)) if *first + *count == entry.number => *count += 1,
            _ => groups.push((entry.number, 1)),
        }
    }
    groups
}
