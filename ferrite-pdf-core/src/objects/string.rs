use super::date::{format_pdf_date, parse_pdf_date};
use chrono::{DateTime, FixedOffset};

/// Serialization form of a string object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    #[default]
    Literal,
    Hex,
}

/// PDF string: raw bytes plus the notation they were written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfString {
    bytes: Vec<u8>,
    format: StringFormat,
}

impl PdfString {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: StringFormat::Literal,
        }
    }

    pub fn hex(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: StringFormat::Hex,
        }
    }

    /// Literal string holding `D:YYYYMMDDHHmmSSOHH'mm'`.
    pub fn from_date(date: &DateTime<FixedOffset>) -> Self {
        Self::new(format_pdf_date(date).into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn format(&self) -> StringFormat {
        self.format
    }

    pub fn set_format(&mut self, format: StringFormat) {
        self.format = format;
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Interprets the bytes as a PDF date string.
    pub fn as_date(&self) -> Option<DateTime<FixedOffset>> {
        parse_pdf_date(&self.bytes)
    }
}

impl From<&str> for PdfString {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for PdfString {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_formats() {
        let lit = PdfString::from("Hello");
        assert_eq!(lit.format(), StringFormat::Literal);
        assert_eq!(lit.as_str(), Some("Hello"));

        let hex = PdfString::hex(vec![0xFE, 0xFF]);
        assert_eq!(hex.format(), StringFormat::Hex);
        assert_eq!(hex.as_str(), None);
        assert_ne!(PdfString::new(b"A".to_vec()), PdfString::hex(b"A".to_vec()));
    }

    #[test]
    fn test_date_string() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let date = offset.with_ymd_and_hms(2023, 5, 17, 9, 30, 0).unwrap();
        let s = PdfString::from_date(&date);
        assert_eq!(s.as_str(), Some("D:20230517093000+02'00'"));
        assert_eq!(s.as_date(), Some(date));
    }
}
