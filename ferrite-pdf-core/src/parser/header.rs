//! PDF Header Parser
//!
//! Parses PDF header and version according to ISO 32000-1 Section 7.5.2

use crate::error::{PdfError, Result};
use std::fmt;
use std::str::FromStr;

/// Bytes searched for `%PDF-` at the start of a file
const HEADER_SEARCH_WINDOW: usize = 1024;

/// PDF Version information
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    pub const V1_4: PdfVersion = PdfVersion::new(1, 4);
    /// First version with xref streams and object streams
    pub const V1_5: PdfVersion = PdfVersion::new(1, 5);
    pub const V1_7: PdfVersion = PdfVersion::new(1, 7);

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Check if this version is supported
    pub fn is_supported(&self) -> bool {
        matches!((self.major, self.minor), (1, 0..=7) | (2, 0))
    }
}

impl Default for PdfVersion {
    fn default() -> Self {
        Self::V1_7
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PdfVersion {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        PdfHeader::parse_version(s.trim())
            .ok_or_else(|| PdfError::structure(format!("Invalid PDF version '{s}'")))
    }
}

/// PDF Header information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfHeader {
    pub version: PdfVersion,
    /// Offset of `%PDF-`; non-zero when the file starts with junk
    pub offset: usize,
    pub has_binary_marker: bool,
}

impl PdfHeader {
    /// Locate and parse the `%PDF-M.m` line
    pub fn parse(data: &[u8]) -> Result<Self> {
        let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
        let offset = window
            .windows(5)
            .position(|w| w == b"%PDF-")
            .ok_or_else(|| PdfError::structure("PDF header not found"))?;
        if offset > 0 {
            tracing::warn!("PDF header found at offset {} instead of 0", offset);
        }

        let line_start = offset + 5;
        let line_end = data[line_start..]
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .map_or(data.len(), |p| line_start + p);
        let line = String::from_utf8_lossy(&data[line_start..line_end]);

        let version = Self::parse_version(line.trim())
            .ok_or_else(|| PdfError::structure(format!("Invalid PDF header version '{line}'")))?;
        if !version.is_supported() {
            return Err(PdfError::Unsupported(format!("PDF version {version}")));
        }

        Ok(Self {
            version,
            offset,
            has_binary_marker: Self::check_binary_marker(&data[line_end..]),
        })
    }

    fn parse_version(text: &str) -> Option<PdfVersion> {
        let (major, minor) = text.split_once('.')?;
        // Some producers append junk after the minor digit
        let minor: String = minor.chars().take_while(char::is_ascii_digit).collect();
        Some(PdfVersion::new(major.parse().ok()?, minor.parse().ok()?))
    }

    /// Binary comment on the line after the header (at least 4 high bytes)
    fn check_binary_marker(rest: &[u8]) -> bool {
        let start = rest
            .iter()
            .position(|&b| b != b'\r' && b != b'\n')
            .unwrap_or(rest.len());
        let line = &rest[start..];
        if line.first() != Some(&b'%') {
            return false;
        }
        line.iter()
            .skip(1)
            .take_while(|&&b| b != b'\r' && b != b'\n')
            .filter(|&&b| b >= 128)
            .count()
            >= 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_header() {
        let header = PdfHeader::parse(b"%PDF-1.7\n1 0 obj").unwrap();
        assert_eq!(header.version, PdfVersion::new(1, 7));
        assert_eq!(header.offset, 0);
        assert!(!header.has_binary_marker);
    }

    #[test]
    fn test_version_from_str() {
        assert_eq!("1.5".parse::<PdfVersion>().unwrap(), PdfVersion::V1_5);
        assert_eq!(" 2.0 ".parse::<PdfVersion>().unwrap(), PdfVersion::new(2, 0));
        assert!("seven".parse::<PdfVersion>().is_err());
        assert!(PdfVersion::V1_4 < PdfVersion::V1_5);
    }

    #[test]
    fn test_binary_marker() {
        let header = PdfHeader::parse(b"%PDF-1.4\r\n%\xE2\xE3\xCF\xD3\r\n").unwrap();
        assert_eq!(header.version, PdfVersion::V1_4);
        assert!(header.has_binary_marker);
    }

    #[test]
    fn test_header_after_junk() {
        let header = PdfHeader::parse(b"garbage\n%PDF-2.0\n").unwrap();
        assert_eq!(header.version, PdfVersion::new(2, 0));
        assert_eq!(header.offset, 8);
    }

    #[test]
    fn test_invalid_headers() {
        assert!(PdfHeader::parse(b"not a pdf").is_err());
        assert!(PdfHeader::parse(b"%PDF-x.y\n").is_err());
        assert!(matches!(
            PdfHeader::parse(b"%PDF-3.0\n"),
            Err(PdfError::Unsupported(_))
        ));
    }

    #[test]
    fn test_version_ordering() {
        assert!(PdfVersion::V1_4 < PdfVersion::V1_5);
        assert_eq!(PdfVersion::V1_4.max(PdfVersion::V1_5), PdfVersion::V1_5);
        assert_eq!(PdfVersion::new(1, 6).to_string(), "1.6");
    }
}
