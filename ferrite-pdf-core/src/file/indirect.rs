//! Indirect object table
//!
//! Objects are materialized on first access. Three layers answer a lookup,
//! in order: objects modified or added in this session, objects already
//! woken from the file, and the original cross-reference entries.

use super::loader::Loader;
use super::FileId;
use crate::error::{PdfError, Result};
use crate::objects::{Object, ObjectId};
use crate::parser::{ObjectStream, ParseOptions, XRefEntry, XRefUsage};
use std::collections::{BTreeMap, HashMap};

/// An entry of the indirect object table
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    file: FileId,
    entry: XRefEntry,
    data: Object,
    /// Still identical to what the source file holds
    original: bool,
}

impl IndirectObject {
    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.entry.number, self.entry.generation)
    }

    pub fn number(&self) -> u32 {
        self.entry.number
    }

    pub fn generation(&self) -> u16 {
        self.entry.generation
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn entry(&self) -> XRefEntry {
        self.entry
    }

    pub fn usage(&self) -> XRefUsage {
        self.entry.usage
    }

    pub fn is_in_use(&self) -> bool {
        self.entry.usage != XRefUsage::Free
    }

    pub fn is_original(&self) -> bool {
        self.original
    }

    pub fn data(&self) -> &Object {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Object {
        &mut self.data
    }

    pub fn set_data(&mut self, data: Object) {
        self.data = data;
    }

    /// Reference to this object, for use inside other objects.
    pub fn reference(&self) -> Object {
        Object::Reference(self.id())
    }
}

/// The indirect object table of one file
#[derive(Debug)]
pub struct IndirectObjects {
    file: FileId,
    source: Option<Vec<u8>>,
    options: ParseOptions,
    /// Entries as read from the file, never changed afterwards
    xref_entries: BTreeMap<u32, XRefEntry>,
    /// Objects materialized from the file and not modified since
    woken: HashMap<u32, IndirectObject>,
    /// Objects added, updated or freed in this session
    modified: BTreeMap<u32, IndirectObject>,
    object_streams: HashMap<u32, ObjectStream>,
    last_object_number: u32,
}

impl IndirectObjects {
    /// Table of a new, empty file. Only the free head (object 0) exists.
    pub(crate) fn new(file: FileId) -> Self {
        let head = XRefEntry::free(0, 0, XRefEntry::UNREUSABLE_GENERATION);
        Self {
            file,
            source: None,
            options: ParseOptions::default(),
            xref_entries: BTreeMap::from([(0, head)]),
            woken: HashMap::new(),
            modified: BTreeMap::new(),
            object_streams: HashMap::new(),
            last_object_number: 0,
        }
    }

    /// Table over the bytes of an existing file.
    pub(crate) fn from_source(
        file: FileId,
        source: Vec<u8>,
        xref_entries: BTreeMap<u32, XRefEntry>,
        last_object_number: u32,
        options: ParseOptions,
    ) -> Self {
        Self {
            file,
            source: Some(source),
            options,
            xref_entries,
            woken: HashMap::new(),
            modified: BTreeMap::new(),
            object_streams: HashMap::new(),
            last_object_number,
        }
    }

    pub fn file_id(&self) -> FileId {
        self.file
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    /// Bytes of the file this table was loaded from.
    pub fn source(&self) -> Option<&[u8]> {
        self.source.as_deref()
    }

    pub fn last_object_number(&self) -> u32 {
        self.last_object_number
    }

    /// Number of slots, free ones and object 0 included.
    pub fn len(&self) -> usize {
        self.last_object_number as usize + 1
    }

    /// True when no slot holds an in-use object.
    pub fn is_empty(&self) -> bool {
        let modified_in_use = self.modified.values().any(IndirectObject::is_in_use);
        let original_in_use = self
            .xref_entries
            .values()
            .any(|e| !e.is_free() && !self.modified.contains_key(&e.number));
        !modified_in_use && !original_in_use
    }

    /// Entries read from the file.
    pub fn original_entries(&self) -> &BTreeMap<u32, XRefEntry> {
        &self.xref_entries
    }

    /// Numbers added, updated or freed in this session, ascending.
    pub fn modified_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.modified.keys().copied()
    }

    pub fn is_modified(&self, number: u32) -> bool {
        self.modified.contains_key(&number)
    }

    /// Modified object `number`, without touching the file.
    pub fn modified(&self, number: u32) -> Option<&IndirectObject> {
        self.modified.get(&number)
    }

    /// Current entry for `number`, without materializing it.
    pub fn xref_entry(&self, number: u32) -> Option<XRefEntry> {
        if let Some(object) = self.modified.get(&number) {
            return Some(object.entry);
        }
        if number > self.last_object_number {
            return None;
        }
        Some(
            self.xref_entries
                .get(&number)
                .copied()
                .unwrap_or_else(|| XRefEntry::free(number, 0, 0)),
        )
    }

    /// Adds `data` under the next object number (generation 0).
    pub fn add(&mut self, data: impl Into<Object>) -> ObjectId {
        self.last_object_number += 1;
        let number = self.last_object_number;
        let entry = XRefEntry::in_use(number, 0, 0);
        self.modified.insert(
            number,
            IndirectObject {
                file: self.file,
                entry,
                data: data.into(),
                original: false,
            },
        );
        tracing::trace!("Added object {}", number);
        ObjectId::new(number, 0)
    }

    /// Object `number`, materialized from the file on first access.
    /// Numbers past the last object resolve to `None`; numbers in range
    /// that the file never listed resolve to a free object.
    pub fn resolve(&mut self, number: u32) -> Result<Option<&IndirectObject>> {
        if self.modified.contains_key(&number) {
            return Ok(self.modified.get(&number));
        }
        if !self.woken.contains_key(&number) {
            let Some(object) = self.materialize(number)? else {
                return Ok(None);
            };
            self.woken.insert(number, object);
        }
        Ok(self.woken.get(&number))
    }

    /// Mutable access to object `number`; the object counts as modified.
    pub fn resolve_mut(&mut self, number: u32) -> Result<Option<&mut IndirectObject>> {
        if number > self.last_object_number && !self.modified.contains_key(&number) {
            return Ok(None);
        }
        self.update(number)?;
        Ok(self.modified.get_mut(&number))
    }

    /// Marks object `number` as modified so the next save writes it.
    pub fn update(&mut self, number: u32) -> Result<()> {
        if self.modified.contains_key(&number) {
            return Ok(());
        }
        let mut object = match self.woken.remove(&number) {
            Some(object) => object,
            None => self
                .materialize(number)?
                .ok_or_else(|| PdfError::usage(format!("Object {number} does not exist")))?,
        };
        if !object.is_in_use() {
            self.woken.insert(number, object);
            return Err(PdfError::usage(format!("Object {number} is free")));
        }
        object.original = false;
        // Rewritten objects always go out uncompressed
        object.entry = XRefEntry::in_use(number, 0, object.entry.generation);
        self.modified.insert(number, object);
        Ok(())
    }

    /// Replaces the data of in-use object `number`.
    pub fn replace(&mut self, number: u32, data: impl Into<Object>) -> Result<()> {
        self.update(number)?;
        if let Some(object) = self.modified.get_mut(&number) {
            object.data = data.into();
        }
        Ok(())
    }

    /// Frees object `number`. Its number is never reused: the entry gets the
    /// unreusable generation.
    pub fn remove_at(&mut self, number: u32) -> Result<()> {
        if number == 0 {
            return Err(PdfError::usage("Object 0 is the free list head"));
        }
        let entry = self
            .xref_entry(number)
            .ok_or_else(|| PdfError::usage(format!("Object {number} does not exist")))?;
        if entry.is_free() {
            return Err(PdfError::usage(format!("Object {number} is already free")));
        }

        self.woken.remove(&number);
        self.modified.insert(
            number,
            IndirectObject {
                file: self.file,
                entry: XRefEntry::free(number, 0, XRefEntry::UNREUSABLE_GENERATION),
                data: Object::Null,
                original: false,
            },
        );
        tracing::trace!("Freed object {}", number);
        Ok(())
    }

    /// Reserves the next number with a null placeholder.
    pub(crate) fn reserve(&mut self) -> ObjectId {
        self.add(Object::Null)
    }

    pub(crate) fn set_modified_data(&mut self, number: u32, data: Object) {
        if let Some(object) = self.modified.get_mut(&number) {
            object.data = data;
        }
    }

    fn materialize(&mut self, number: u32) -> Result<Option<IndirectObject>> {
        if number > self.last_object_number {
            return Ok(None);
        }
        let entry = match self.xref_entries.get(&number) {
            Some(entry) => *entry,
            None => {
                tracing::debug!("Object {} missing from xref, treating as free", number);
                XRefEntry::free(number, 0, 0)
            }
        };

        let data = match &self.source {
            Some(source) => {
                let mut loader = Loader::new(
                    source,
                    &self.xref_entries,
                    &mut self.object_streams,
                    self.options,
                );
                loader.load(entry)?
            }
            None => Object::Null,
        };

        Ok(Some(IndirectObject {
            file: self.file,
            entry,
            data,
            original: true,
        }))
    }
}
