//! PDF files and the session that opens them.

mod import;
mod indirect;
mod loader;

pub use import::ImportSession;
pub use indirect::{IndirectObject, IndirectObjects};

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object};
use crate::parser::header::PdfHeader;
use crate::parser::xref::load_xref;
use crate::parser::{ContentParser, ParseOptions, PdfVersion};
use crate::writer::{PdfWriter, SerializationMode, WriterConfig};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Identity of a file within a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl FileId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Opens and creates files, giving each a distinct [`FileId`].
#[derive(Debug, Default)]
pub struct Session {
    next_file_id: u32,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> FileId {
        let id = FileId::new(self.next_file_id);
        self.next_file_id += 1;
        id
    }

    /// New empty file
    pub fn create(&mut self) -> PdfFile {
        PdfFile::new(self.allocate())
    }

    /// Open the file at `path` with default (strict) parsing
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<PdfFile> {
        self.open_with_options(path, ParseOptions::default())
    }

    pub fn open_with_options(
        &mut self,
        path: impl AsRef<Path>,
        options: ParseOptions,
    ) -> Result<PdfFile> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let mut file = self.load(data, options)?;
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// Parse a file held in memory
    pub fn load(&mut self, data: Vec<u8>, options: ParseOptions) -> Result<PdfFile> {
        PdfFile::parse(self.allocate(), data, options)
    }
}

/// A PDF file: version, trailer and its indirect object table
#[derive(Debug)]
pub struct PdfFile {
    id: FileId,
    version: PdfVersion,
    trailer: Dictionary,
    objects: IndirectObjects,
    path: Option<PathBuf>,
    config: WriterConfig,
    startxref: Option<u64>,
}

impl PdfFile {
    fn new(id: FileId) -> Self {
        Self {
            id,
            version: PdfVersion::default(),
            trailer: Dictionary::new(),
            objects: IndirectObjects::new(id),
            path: None,
            config: WriterConfig::default(),
            startxref: None,
        }
    }

    fn parse(id: FileId, data: Vec<u8>, options: ParseOptions) -> Result<Self> {
        let header = PdfHeader::parse(&data)?;
        let xref = load_xref(&data, options)?;
        tracing::debug!(
            "Loaded PDF {} with {} xref entries, last object {}",
            header.version,
            xref.entries.len(),
            xref.last_object_number
        );

        let objects = IndirectObjects::from_source(
            id,
            data,
            xref.entries,
            xref.last_object_number,
            options,
        );
        Ok(Self {
            id,
            version: header.version,
            trailer: xref.trailer,
            objects,
            path: None,
            config: WriterConfig::default(),
            startxref: Some(xref.startxref),
        })
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn version(&self) -> PdfVersion {
        self.version
    }

    pub fn set_version(&mut self, version: PdfVersion) {
        self.version = version;
    }

    /// Document-level trailer entries (`/Root`, `/Info`, `/ID`, ...)
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    pub fn objects(&self) -> &IndirectObjects {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut IndirectObjects {
        &mut self.objects
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut WriterConfig {
        &mut self.config
    }

    /// Offset of the newest xref section of the loaded file
    pub fn startxref(&self) -> Option<u64> {
        self.startxref
    }

    /// Shorthand for adding an object to the table
    pub fn add(&mut self, data: impl Into<Object>) -> crate::objects::ObjectId {
        self.objects.add(data)
    }

    /// Follows a reference to its data. Direct objects come back as they
    /// are; references to free or missing objects resolve to null.
    pub fn resolve(&mut self, object: &Object) -> Result<Object> {
        let Object::Reference(id) = object else {
            return Ok(object.clone());
        };
        match self.objects.resolve(id.number())? {
            Some(target) if target.is_in_use() && target.generation() == id.generation() => {
                Ok(target.data().clone())
            }
            _ => Ok(Object::Null),
        }
    }

    /// Content parser over a `/Contents` value: one stream or an array of
    /// streams, each decoded and read as one sequence.
    pub fn content(&mut self, contents: &Object) -> Result<ContentParser> {
        let streams = match self.resolve(contents)? {
            Object::Stream(stream) => vec![stream],
            Object::Array(items) => {
                let mut streams = Vec::with_capacity(items.len());
                for item in &items {
                    match self.resolve(item)? {
                        Object::Stream(stream) => streams.push(stream),
                        Object::Null => {}
                        other => {
                            return Err(PdfError::structure(format!(
                                "Content array entry is a {}",
                                other.type_name()
                            )));
                        }
                    }
                }
                streams
            }
            Object::Null => Vec::new(),
            other => {
                return Err(PdfError::structure(format!(
                    "Content must be a stream or array, found {}",
                    other.type_name()
                )));
            }
        };

        let segments = streams
            .iter()
            .map(|stream| stream.decode())
            .collect::<Result<Vec<_>>>()?;
        Ok(ContentParser::with_options(segments, self.objects.options()))
    }

    /// Serialize the whole file into memory
    pub fn to_bytes(&mut self, mode: SerializationMode) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out, mode)?;
        Ok(out)
    }

    pub fn write_to<W: Write>(&mut self, writer: W, mode: SerializationMode) -> Result<()> {
        let mut writer = PdfWriter::new(writer, self.config.clone());
        match mode {
            SerializationMode::Standard => writer.write_standard(self),
            SerializationMode::Incremental => writer.write_incremental(self),
        }
    }

    /// Save back to the path the file was opened from
    pub fn save(&mut self, mode: SerializationMode) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| PdfError::usage("File has no path; use save_as"))?;
        self.save_as(path, mode)
    }

    /// Write to `path` through a temporary file in the same directory that
    /// replaces the target only once fully written.
    pub fn save_as(&mut self, path: impl AsRef<Path>, mode: SerializationMode) -> Result<()> {
        let path = path.as_ref();
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = tempfile::NamedTempFile::new_in(directory)?;
        {
            let mut out = BufWriter::new(temp.as_file_mut());
            self.write_to(&mut out, mode)?;
            out.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| PdfError::Io(e.error))?;

        tracing::debug!("Saved {} ({:?})", path.display(), mode);
        self.path = Some(path.to_path_buf());
        Ok(())
    }
}
