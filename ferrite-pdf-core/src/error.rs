use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Invalid PDF structure: {0}")]
    Structure(String),

    #[error("Circular reference detected while resolving object {0}")]
    CircularReference(u32),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Unexpected end of stream at position {position}")]
    EndOfStream { position: usize },

    #[error("Position {position} out of range (length {length})")]
    OutOfRange { position: usize, length: usize },

    #[error("Filter error: {0}")]
    Filter(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;

impl PdfError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        PdfError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn structure(message: impl Into<String>) -> Self {
        PdfError::Structure(message.into())
    }

    pub(crate) fn usage(message: impl Into<String>) -> Self {
        PdfError::Usage(message.into())
    }

    /// True when the caller misused the API rather than the file being broken.
    pub fn is_usage(&self) -> bool {
        matches!(self, PdfError::Usage(_))
    }

    /// True for lexical and grammar errors in the input bytes.
    pub fn is_syntax(&self) -> bool {
        matches!(self, PdfError::Syntax { .. } | PdfError::EndOfStream { .. })
    }

    /// Byte offset attached to the error, if any.
    pub fn position(&self) -> Option<usize> {
        match self {
            PdfError::Syntax { position, .. }
            | PdfError::EndOfStream { position }
            | PdfError::OutOfRange { position, .. } => Some(*position),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_pdf_error_display() {
        let error = PdfError::Structure("missing startxref".to_string());
        assert_eq!(error.to_string(), "Invalid PDF structure: missing startxref");

        let error = PdfError::syntax(42, "Unterminated string");
        assert_eq!(
            error.to_string(),
            "Syntax error at position 42: Unterminated string"
        );
    }

    #[test]
    fn test_pdf_error_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let pdf_error = PdfError::from(io_error);

        match pdf_error {
            PdfError::Io(ref err) => assert_eq!(err.kind(), ErrorKind::NotFound),
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(PdfError::usage("double free").is_usage());
        assert!(!PdfError::structure("bad xref").is_usage());
        assert!(PdfError::syntax(3, "bad").is_syntax());
        assert!(PdfError::EndOfStream { position: 9 }.is_syntax());
        assert!(!PdfError::OutOfRange {
            position: 10,
            length: 4
        }
        .is_syntax());
    }

    #[test]
    fn test_error_position() {
        assert_eq!(PdfError::syntax(17, "x").position(), Some(17));
        assert_eq!(
            PdfError::OutOfRange {
                position: 5,
                length: 2
            }
            .position(),
            Some(5)
        );
        assert_eq!(PdfError::usage("x").position(), None);
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfError>();
    }
}
