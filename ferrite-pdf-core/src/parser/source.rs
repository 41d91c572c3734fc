//! Random-access byte sources for the lexer.
//!
//! A file is one contiguous slice. A page's content may be split across
//! several streams, which [`SegmentedSource`] presents as a single sequence
//! with absolute positions.

/// Positioned, seekable view over bytes.
pub trait ByteSource {
    fn position(&self) -> usize;

    /// Moves the cursor. Positions past the end are allowed and read as EOF.
    fn seek(&mut self, position: usize);

    fn len(&self) -> usize;

    /// Byte `offset` positions ahead of the cursor.
    fn peek_at(&self, offset: usize) -> Option<u8>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    fn advance(&mut self, count: usize) {
        let target = self.position().saturating_add(count);
        self.seek(target);
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.advance(1);
        Some(byte)
    }

    /// Copy of the absolute range `start..end`, clamped to the source.
    fn copy_range(&self, start: usize, end: usize) -> Vec<u8>;

    /// True when the cursor sits on the first byte of a segment other than
    /// the first. Segment boundaries separate tokens.
    fn at_segment_start(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

impl ByteSource for SliceSource<'_> {
    fn position(&self) -> usize {
        self.position
    }

    fn seek(&mut self, position: usize) {
        self.position = position;
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.position.checked_add(offset)?).copied()
    }

    fn copy_range(&self, start: usize, end: usize) -> Vec<u8> {
        let end = end.min(self.data.len());
        let start = start.min(end);
        self.data[start..end].to_vec()
    }
}

/// Several byte arrays read as one. Each segment keeps its cumulative base
/// offset so a seek can land in any earlier or later segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentedSource {
    segments: Vec<Vec<u8>>,
    bases: Vec<usize>,
    total: usize,
    position: usize,
}

impl SegmentedSource {
    pub fn new(segments: Vec<Vec<u8>>) -> Self {
        let segments: Vec<Vec<u8>> = segments.into_iter().filter(|s| !s.is_empty()).collect();
        let mut bases = Vec::with_capacity(segments.len());
        let mut total = 0;
        for segment in &segments {
            bases.push(total);
            total += segment.len();
        }
        Self {
            segments,
            bases,
            total,
            position: 0,
        }
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Index of the segment holding absolute `position`.
    pub fn segment_index(&self, position: usize) -> Option<usize> {
        if position >= self.total {
            return None;
        }
        Some(match self.bases.binary_search(&position) {
            Ok(index) => index,
            Err(index) => index - 1,
        })
    }

    /// Absolute offset of the first byte of segment `index`.
    pub fn segment_base(&self, index: usize) -> Option<usize> {
        self.bases.get(index).copied()
    }

    fn byte_at(&self, position: usize) -> Option<u8> {
        let index = self.segment_index(position)?;
        self.segments[index].get(position - self.bases[index]).copied()
    }
}

impl ByteSource for SegmentedSource {
    fn position(&self) -> usize {
        self.position
    }

    fn seek(&mut self, position: usize) {
        self.position = position;
    }

    fn len(&self) -> usize {
        self.total
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.byte_at(self.position.checked_add(offset)?)
    }

    fn copy_range(&self, start: usize, end: usize) -> Vec<u8> {
        let end = end.min(self.total);
        let mut out = Vec::with_capacity(end.saturating_sub(start));
        let mut pos = start;
        while pos < end {
            let Some(index) = self.segment_index(pos) else {
                break;
            };
            let segment = &self.segments[index];
            let local = pos - self.bases[index];
            let take = (segment.len() - local).min(end - pos);
            out.extend_from_slice(&segment[local..local + take]);
            pos += take;
        }
        out
    }

    fn at_segment_start(&self) -> bool {
        self.position > 0
            && self.position < self.total
            && self.bases.binary_search(&self.position).is_ok()
    }
}
