//! Growable byte buffer
//!
//! Backing storage for stream bodies. The buffer keeps its own capacity policy
//! (doubling, never below the requested minimum) and a cursor that may sit past
//! the end of the data so that writes can extend it.

use crate::error::{PdfError, Result};
use std::fmt;
use std::io;

/// Byte order used by the multi-byte numeric readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Most significant byte first (PDF convention)
    #[default]
    BigEndian,
    /// Least significant byte first
    LittleEndian,
}

/// Growable byte array with a read/write cursor
#[derive(Clone, Default)]
pub struct ByteBuffer {
    /// Allocated storage; `data.len()` is the capacity
    data: Vec<u8>,
    length: usize,
    position: usize,
    byte_order: ByteOrder,
}

impl ByteBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    /// The used portion of the buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Copy of the used portion of the buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.length);
        self.data
    }

    fn ensure_capacity(&mut self, required: usize) {
        if required > self.data.len() {
            let new_capacity = std::cmp::max(self.data.len() * 2, required);
            self.data.resize(new_capacity, 0);
        }
    }

    fn check_index(&self, at: usize) -> Result<()> {
        if at > self.length {
            return Err(PdfError::OutOfRange {
                position: at,
                length: self.length,
            });
        }
        Ok(())
    }

    /// Append bytes at the end, leaving the cursor untouched
    pub fn append(&mut self, bytes: &[u8]) {
        let end = self.length + bytes.len();
        self.ensure_capacity(end);
        self.data[self.length..end].copy_from_slice(bytes);
        self.length = end;
    }

    /// Insert bytes at `at`, shifting the tail right
    pub fn insert(&mut self, at: usize, bytes: &[u8]) -> Result<()> {
        self.check_index(at)?;
        let count = bytes.len();
        self.ensure_capacity(self.length + count);
        self.data.copy_within(at..self.length, at + count);
        self.data[at..at + count].copy_from_slice(bytes);
        self.length += count;
        Ok(())
    }

    /// Remove `count` bytes starting at `at`
    pub fn delete(&mut self, at: usize, count: usize) -> Result<()> {
        let end = at.checked_add(count).unwrap_or(usize::MAX);
        if end > self.length {
            return Err(PdfError::OutOfRange {
                position: end,
                length: self.length,
            });
        }
        self.data.copy_within(end..self.length, at);
        self.length -= count;
        Ok(())
    }

    /// Overwrite bytes starting at `at`, growing the buffer if they run past the end
    pub fn replace(&mut self, at: usize, bytes: &[u8]) -> Result<()> {
        self.check_index(at)?;
        let end = at + bytes.len();
        self.ensure_capacity(end);
        self.data[at..end].copy_from_slice(bytes);
        self.length = self.length.max(end);
        Ok(())
    }

    /// Write bytes at the cursor and advance it.
    ///
    /// A cursor beyond the end zero-fills the gap first.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.position > self.length {
            self.set_length(self.position);
        }
        let end = self.position + bytes.len();
        self.ensure_capacity(end);
        self.data[self.position..end].copy_from_slice(bytes);
        self.length = self.length.max(end);
        self.position = end;
    }

    /// Truncate or zero-extend the used length
    pub fn set_length(&mut self, length: usize) {
        if length > self.length {
            self.ensure_capacity(length);
            self.data[self.length..length].fill(0);
        }
        self.length = length;
    }

    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Move the cursor by a signed delta
    pub fn skip(&mut self, delta: isize) -> Result<()> {
        let target = self.position as isize + delta;
        if target < 0 {
            return Err(PdfError::OutOfRange {
                position: 0,
                length: self.length,
            });
        }
        self.position = target as usize;
        Ok(())
    }

    pub fn peek(&self) -> Option<u8> {
        self.as_slice().get(self.position).copied()
    }

    /// Read `count` bytes at the cursor
    pub fn read(&mut self, count: usize) -> Result<&[u8]> {
        let start = self.position;
        let end = start.checked_add(count).unwrap_or(usize::MAX);
        if end > self.length {
            return Err(PdfError::EndOfStream {
                position: self.length.min(start),
            });
        }
        self.position = end;
        Ok(&self.data[start..end])
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    /// Read an unsigned integer of `width` bytes (0..=8) in the buffer byte order
    pub fn read_uint(&mut self, width: usize) -> Result<u64> {
        if width > 8 {
            return Err(PdfError::Unsupported(format!(
                "integer field width {width} exceeds 8 bytes"
            )));
        }
        let byte_order = self.byte_order;
        let bytes = self.read(width)?;
        let value = match byte_order {
            ByteOrder::BigEndian => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
            ByteOrder::LittleEndian => bytes
                .iter()
                .rev()
                .fold(0u64, |acc, &b| (acc << 8) | b as u64),
        };
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_uint(2)? as u16)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_uint(2)? as u16 as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_uint(4)? as u32)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_uint(4)? as u32 as i32)
    }

    /// Read up to the next CR or LF (exclusive), consuming the line ending.
    ///
    /// Fails with `EndOfStream` if no line ending is found; the cursor is left
    /// where it was in that case.
    pub fn read_line(&mut self) -> Result<Vec<u8>> {
        let start = self.position;
        let data = self.as_slice();
        if start >= data.len() {
            return Err(PdfError::EndOfStream { position: start });
        }
        let eol = data[start..]
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .ok_or(PdfError::EndOfStream {
                position: data.len(),
            })?;
        let line = data[start..start + eol].to_vec();
        let mut next = start + eol;
        if data[next] == b'\r' && data.get(next + 1) == Some(&b'\n') {
            next += 1;
        }
        self.position = next + 1;
        Ok(line)
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("length", &self.length)
            .field("capacity", &self.data.len())
            .field("position", &self.position)
            .finish()
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        let length = data.len();
        Self {
            data,
            length,
            ..Self::default()
        }
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        Self::from(data.to_vec())
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl io::Write for ByteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for ByteBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.length.saturating_sub(self.position);
        let count = available.min(buf.len());
        if count == 0 {
            return Ok(0);
        }
        buf[..count].copy_from_slice(&self.data[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_grows_by_doubling() {
        let mut buffer = ByteBuffer::with_capacity(4);
        buffer.append(b"abcd");
        assert_eq!(buffer.capacity(), 4);
        buffer.append(b"e");
        assert_eq!(buffer.capacity(), 8);
        buffer.append(&[0u8; 20]);
        assert_eq!(buffer.capacity(), 25);
        assert_eq!(buffer.len(), 25);
        assert!(buffer.len() <= buffer.capacity());
    }

    #[test]
    fn test_insert_delete_replace() {
        let mut buffer = ByteBuffer::from(b"Hello World".to_vec());
        buffer.insert(5, b",").unwrap();
        assert_eq!(buffer.as_slice(), b"Hello, World");

        buffer.delete(0, 7).unwrap();
        assert_eq!(buffer.as_slice(), b"World");

        buffer.replace(3, b"thy!").unwrap();
        assert_eq!(buffer.as_slice(), b"Worthy!");

        assert!(matches!(
            buffer.insert(99, b"x"),
            Err(PdfError::OutOfRange { position: 99, .. })
        ));
        assert!(buffer.delete(5, 10).is_err());
        assert_eq!(buffer.as_slice(), b"Worthy!");
    }

    #[test]
    fn test_read_past_end_is_end_of_stream() {
        let mut buffer = ByteBuffer::from(b"abc".to_vec());
        assert_eq!(buffer.read(2).unwrap(), b"ab");
        assert!(matches!(
            buffer.read(2),
            Err(PdfError::EndOfStream { .. })
        ));
        assert_eq!(buffer.position(), 2);
        assert_eq!(buffer.read_byte().unwrap(), b'c');
    }

    #[test]
    fn test_numeric_reads_respect_byte_order() {
        let mut buffer = ByteBuffer::from(vec![0x01, 0x02, 0xFF, 0xFE, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(buffer.read_u16().unwrap(), 0x0102);
        assert_eq!(buffer.read_i16().unwrap(), -2);

        buffer.set_byte_order(ByteOrder::LittleEndian);
        assert_eq!(buffer.read_u32().unwrap(), 0x0001_0000);

        buffer.seek(0);
        assert_eq!(buffer.read_uint(3).unwrap(), 0xFF0201);
        assert!(buffer.read_uint(9).is_err());
    }

    #[test]
    fn test_read_line() {
        let mut buffer = ByteBuffer::from(b"first\r\nsecond\rthird\nno-eol".to_vec());
        assert_eq!(buffer.read_line().unwrap(), b"first");
        assert_eq!(buffer.read_line().unwrap(), b"second");
        assert_eq!(buffer.read_line().unwrap(), b"third");
        let before = buffer.position();
        assert!(buffer.read_line().is_err());
        assert_eq!(buffer.position(), before);
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let mut buffer = ByteBuffer::from(b"ab".to_vec());
        buffer.seek(4);
        buffer.write_bytes(b"cd");
        assert_eq!(buffer.as_slice(), b"ab\0\0cd");
        assert_eq!(buffer.position(), 6);
    }

    #[test]
    fn test_set_length_truncates_and_extends() {
        let mut buffer = ByteBuffer::from(b"abcdef".to_vec());
        buffer.set_length(3);
        assert_eq!(buffer.as_slice(), b"abc");
        buffer.set_length(5);
        assert_eq!(buffer.as_slice(), b"abc\0\0");
    }

    #[test]
    fn test_skip_and_seek() {
        let mut buffer = ByteBuffer::from(b"0123456789".to_vec());
        buffer.skip(4).unwrap();
        assert_eq!(buffer.peek(), Some(b'4'));
        buffer.skip(-2).unwrap();
        assert_eq!(buffer.peek(), Some(b'2'));
        assert!(buffer.skip(-10).is_err());
        buffer.seek(20);
        assert_eq!(buffer.peek(), None);
    }

    #[test]
    fn test_io_traits() {
        use std::io::{Read, Write};

        let mut buffer = ByteBuffer::new();
        write!(buffer, "{} {} obj", 12, 0).unwrap();
        assert_eq!(buffer.as_slice(), b"12 0 obj");

        buffer.seek(0);
        let mut out = String::new();
        buffer.read_to_string(&mut out).unwrap();
        assert_eq!(out, "12 0 obj");
    }
}
