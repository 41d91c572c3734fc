//! PDF parsing
//!
//! Byte sources, the shared tokenizer, the object parser and the loaders for
//! headers, cross-reference sections, object streams and content streams.

pub mod content;
pub mod header;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod source;
pub mod xref;

pub use content::{ContentObject, ContentParser, InlineImage, Operation};
pub use header::PdfVersion;
pub use lexer::{Lexer, Token};
pub use object_stream::ObjectStream;
pub use objects::{NoResolver, ObjectParser, ReferenceResolver};
pub use source::{ByteSource, SegmentedSource, SliceSource};
pub use xref::{XRefEntry, XRefUsage};

/// Inline image data longer than this is treated as unterminated.
pub const DEFAULT_MAX_INLINE_IMAGE_SCAN: usize = 16 * 1024 * 1024;

/// Parsing options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Tolerate common producer mistakes instead of failing
    pub lenient: bool,
    /// Search for `endstream` when `/Length` is missing or wrong
    pub recover_stream_length: bool,
    /// Upper bound on bytes scanned for an inline image `EI`
    pub max_inline_image_scan: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::strict()
    }
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self {
            lenient: false,
            recover_stream_length: false,
            max_inline_image_scan: DEFAULT_MAX_INLINE_IMAGE_SCAN,
        }
    }

    pub fn lenient() -> Self {
        Self {
            lenient: true,
            recover_stream_length: true,
            max_inline_image_scan: DEFAULT_MAX_INLINE_IMAGE_SCAN,
        }
    }
}
