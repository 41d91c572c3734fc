//! # ferrite-pdf
//!
//! A PDF object engine: reads the indirect objects of a file lazily, lets
//! callers add, change and free them, and writes the result back either as
//! a full rewrite or as an incremental update.
//!
//! ## Features
//!
//! - **Lazy loading**: objects are parsed from the original bytes on first access
//! - **Cross-reference tables and streams**, object streams, `/Prev` chains
//! - **Content streams**: flat operations or a structural tree (text, graphics
//!   state, marked content, paths, inline images)
//! - **Writer**: standard or incremental saves, xref table or xref stream output,
//!   atomic replacement of the target file
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrite_pdf::{Dictionary, Object, ParseOptions, Result, SerializationMode, Session};
//!
//! # fn main() -> Result<()> {
//! let mut session = Session::new();
//! let mut file = session.create();
//!
//! let mut catalog = Dictionary::new();
//! catalog.set("Type", Object::name("Catalog"));
//! let root = file.add(catalog);
//! file.trailer_mut().set("Root", root);
//!
//! let bytes = file.to_bytes(SerializationMode::Standard)?;
//! let mut reopened = session.load(bytes, ParseOptions::default())?;
//! let catalog = reopened.resolve(&Object::Reference(root))?;
//! assert_eq!(catalog.as_dict().and_then(|d| d.get_type()), Some("Catalog"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Updating a file in place
//!
//! ```rust,no_run
//! use ferrite_pdf::{Object, SerializationMode, Session};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::new();
//! let mut file = session.open("document.pdf")?;
//! let info = file.add(ferrite_pdf::Dictionary::new());
//! file.trailer_mut().set("Info", info);
//! file.save(SerializationMode::Incremental)?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod file;
pub mod filters;
pub mod objects;
pub mod parser;
pub mod writer;

pub use buffer::ByteBuffer;
pub use error::{PdfError, Result};
pub use file::{FileId, ImportSession, IndirectObject, IndirectObjects, PdfFile, Session};
pub use objects::{Dictionary, Object, ObjectId, PdfString, Stream, StreamKind, StringFormat};
pub use parser::{
    ContentObject, ContentParser, InlineImage, Operation, ParseOptions, PdfVersion, XRefEntry,
    XRefUsage,
};
pub use writer::{SerializationMode, WriterConfig, XRefMode};

/// Current version of ferrite-pdf
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
