//! Materializes indirect objects from the original file bytes.

use crate::error::{PdfError, Result};
use crate::objects::{Object, ObjectId, StreamKind};
use crate::parser::{
    Lexer, ObjectParser, ObjectStream, ParseOptions, ReferenceResolver, SliceSource, XRefEntry,
    XRefUsage,
};
use std::collections::{BTreeMap, HashMap};

/// Borrowed view of everything needed to load objects. The resolve chain
/// (for indirect stream lengths and object stream containers) is tracked in
/// `active` so that cyclic references fail instead of recursing forever.
pub(crate) struct Loader<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) entries: &'a BTreeMap<u32, XRefEntry>,
    pub(crate) object_streams: &'a mut HashMap<u32, ObjectStream>,
    pub(crate) options: ParseOptions,
    active: Vec<u32>,
}

impl<'a> Loader<'a> {
    pub(crate) fn new(
        data: &'a [u8],
        entries: &'a BTreeMap<u32, XRefEntry>,
        object_streams: &'a mut HashMap<u32, ObjectStream>,
        options: ParseOptions,
    ) -> Self {
        Self {
            data,
            entries,
            object_streams,
            options,
            active: Vec::new(),
        }
    }

    /// Data object described by `entry`. Free entries load as null.
    pub(crate) fn load(&mut self, entry: XRefEntry) -> Result<Object> {
        match entry.usage {
            XRefUsage::Free => Ok(Object::Null),
            XRefUsage::InUse => self.load_at_offset(entry),
            XRefUsage::InUseCompressed => self.load_compressed(entry),
        }
    }

    fn load_at_offset(&mut self, entry: XRefEntry) -> Result<Object> {
        if self.active.contains(&entry.number) {
            return Err(PdfError::CircularReference(entry.number));
        }
        let offset = usize::try_from(entry.offset)
            .ok()
            .filter(|&o| o < self.data.len())
            .ok_or_else(|| {
                PdfError::structure(format!(
                    "Object {} offset {} beyond end of file",
                    entry.number, entry.offset
                ))
            })?;

        self.active.push(entry.number);
        let data = self.data;
        let mut parser = ObjectParser::new(Lexer::new(SliceSource::at(data, offset)), self.options);
        let result = parser.parse_indirect_object(self);
        self.active.pop();

        let (id, object) = result?;
        if id != ObjectId::new(entry.number, entry.generation) {
            tracing::warn!(
                "xref entry {} {} points at object {} {}",
                entry.number,
                entry.generation,
                id.number(),
                id.generation()
            );
        }
        Ok(object)
    }

    fn load_compressed(&mut self, entry: XRefEntry) -> Result<Object> {
        let container = entry.stream_number();
        if !self.object_streams.contains_key(&container) {
            let container_entry = self
                .entries
                .get(&container)
                .copied()
                .filter(|e| e.usage == XRefUsage::InUse)
                .ok_or_else(|| {
                    PdfError::structure(format!(
                        "Object {} lives in object stream {} which is not in use",
                        entry.number, container
                    ))
                })?;
            let stream = match self.load_at_offset(container_entry)? {
                Object::Stream(stream) if stream.kind() == StreamKind::ObjectStream => stream,
                other => {
                    return Err(PdfError::structure(format!(
                        "Object {} is a {}, not an object stream",
                        container,
                        other.type_name()
                    )));
                }
            };
            let parsed = ObjectStream::parse(&stream, self.options)?;
            tracing::debug!("Decoded object stream {} ({} objects)", container, parsed.len());
            self.object_streams.insert(container, parsed);
        }

        let object = self
            .object_streams
            .get(&container)
            .and_then(|stream| stream.get(entry.number, entry.stream_index))
            .cloned();
        Ok(object.unwrap_or_else(|| {
            tracing::warn!(
                "Object {} not found in object stream {}",
                entry.number,
                container
            );
            Object::Null
        }))
    }
}

impl ReferenceResolver for Loader<'_> {
    fn resolve_length(&mut self, id: ObjectId) -> Result<Option<i64>> {
        let Some(entry) = self.entries.get(&id.number()).copied() else {
            return Ok(None);
        };
        Ok(self.load(entry)?.as_integer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_with_indirect_length() {
        let data = b"1 0 obj\n<< /Length 2 0 R >>\nstream\nabcd\nendstream\nendobj\n2 0 obj 4 endobj\n";
        let second = data.windows(7).position(|w| w == b"2 0 obj").unwrap();
        let entries = BTreeMap::from([
            (1, XRefEntry::in_use(1, 0, 0)),
            (2, XRefEntry::in_use(2, second as u64, 0)),
        ]);
        let mut streams = HashMap::new();
        let mut loader = Loader::new(data, &entries, &mut streams, ParseOptions::default());

        let object = loader.load(entries[&1]).unwrap();
        assert_eq!(object.as_stream().unwrap().data(), b"abcd");
    }

    #[test]
    fn test_self_referencing_length_is_circular() {
        let data = b"1 0 obj\n<< /Length 1 0 R >>\nstream\nabcd\nendstream\nendobj\n";
        let entries = BTreeMap::from([(1, XRefEntry::in_use(1, 0, 0))]);
        let mut streams = HashMap::new();
        let mut loader = Loader::new(data, &entries, &mut streams, ParseOptions::default());

        assert!(matches!(
            loader.load(entries[&1]),
            Err(PdfError::CircularReference(1))
        ));
    }

    #[test]
    fn test_free_entry_loads_null() {
        let entries = BTreeMap::new();
        let mut streams = HashMap::new();
        let mut loader = Loader::new(b"", &entries, &mut streams, ParseOptions::default());
        assert_eq!(loader.load(XRefEntry::free(3, 0, 1)).unwrap(), Object::Null);
    }

    #[test]
    fn test_offset_out_of_range() {
        let entries = BTreeMap::new();
        let mut streams = HashMap::new();
        let mut loader = Loader::new(b"xx", &entries, &mut streams, ParseOptions::default());
        assert!(matches!(
            loader.load(XRefEntry::in_use(1, 99, 0)),
            Err(PdfError::Structure(_))
        ));
    }
}
