use super::{Dictionary, Object};
use crate::buffer::ByteBuffer;
use crate::error::Result;

/// Specialized stream flavours, decided once from the header dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Generic,
    ObjectStream,
    XRefStream,
}

impl StreamKind {
    pub fn classify(dictionary: &Dictionary) -> Self {
        match dictionary.get_type() {
            Some("ObjStm") => StreamKind::ObjectStream,
            Some("XRef") => StreamKind::XRefStream,
            _ => StreamKind::Generic,
        }
    }
}

/// A stream object: header dictionary plus a growable body.
///
/// `/Length` in the dictionary is advisory once the stream is in memory;
/// the writer always emits the body's real length.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    dictionary: Dictionary,
    body: ByteBuffer,
    kind: StreamKind,
}

impl Stream {
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_dictionary(Dictionary::new(), data)
    }

    pub fn with_dictionary(mut dictionary: Dictionary, data: Vec<u8>) -> Self {
        dictionary.set("Length", data.len() as i64);
        Self::from_parts(dictionary, ByteBuffer::from(data))
    }

    /// Builds a stream without touching its dictionary.
    pub fn from_parts(dictionary: Dictionary, body: ByteBuffer) -> Self {
        let kind = StreamKind::classify(&dictionary);
        Self {
            dictionary,
            body,
            kind,
        }
    }

    pub fn into_parts(self) -> (Dictionary, ByteBuffer) {
        (self.dictionary, self.body)
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Direct access to the header. The stream kind is fixed when the stream
    /// is built; use [`Stream::set_type`] to change `/Type`.
    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dictionary
    }

    /// Flavour decided from `/Type` at construction or by the last
    /// [`Stream::set_type`].
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Sets `/Type` and reclassifies the stream.
    pub fn set_type(&mut self, name: &str) {
        self.dictionary.set("Type", Object::name(name));
        self.kind = StreamKind::classify(&self.dictionary);
    }

    /// Raw (still encoded) body bytes.
    pub fn data(&self) -> &[u8] {
        self.body.as_slice()
    }

    pub fn body(&self) -> &ByteBuffer {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ByteBuffer {
        &mut self.body
    }

    /// Replaces the encoded body and updates `/Length`.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.dictionary.set("Length", data.len() as i64);
        self.body = ByteBuffer::from(data);
    }

    /// Names listed in `/Filter`, in application order.
    pub fn filters(&self) -> Vec<&str> {
        match self.dictionary.get("Filter") {
            Some(Object::Name(name)) => vec![name.as_str()],
            Some(Object::Array(items)) => items.iter().filter_map(Object::as_name).collect(),
            _ => Vec::new(),
        }
    }

    /// Body with every filter in `/Filter` undone.
    pub fn decode(&self) -> Result<Vec<u8>> {
        crate::filters::decode(self.data(), &self.dictionary)
    }

    /// Replaces the body with `data` compressed by FlateDecode.
    #[cfg(feature = "compression")]
    pub fn set_compressed_data(&mut self, data: &[u8]) -> Result<()> {
        let encoded = crate::filters::encode_flate(data)?;
        self.dictionary.set("Filter", Object::name("FlateDecode"));
        self.dictionary.remove("DecodeParms");
        self.set_data(encoded);
        Ok(())
    }
}
