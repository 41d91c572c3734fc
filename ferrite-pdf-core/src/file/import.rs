//! Copying object graphs between files.

use super::indirect::IndirectObjects;
use super::FileId;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId, Stream};
use std::collections::HashMap;

/// Remembers which foreign objects were already copied, so shared and
/// cyclic references map to a single local copy.
#[derive(Debug, Default)]
pub struct ImportSession {
    imported: HashMap<(FileId, u32), ObjectId>,
}

impl ImportSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local id of a foreign object copied earlier in this session.
    pub fn local_id(&self, file: FileId, number: u32) -> Option<ObjectId> {
        self.imported.get(&(file, number)).copied()
    }

    pub fn len(&self) -> usize {
        self.imported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imported.is_empty()
    }
}

impl IndirectObjects {
    /// Deep-copies object `number` of `source`, together with everything it
    /// references, into this table. Returns the local id of the copy.
    pub fn add_external(
        &mut self,
        source: &mut IndirectObjects,
        number: u32,
        session: &mut ImportSession,
    ) -> Result<ObjectId> {
        if source.file_id() == self.file_id() {
            return Err(PdfError::usage(
                "add_external needs an object from another file",
            ));
        }
        self.import_object(source, number, session)
    }

    fn import_object(
        &mut self,
        source: &mut IndirectObjects,
        number: u32,
        session: &mut ImportSession,
    ) -> Result<ObjectId> {
        let key = (source.file_id(), number);
        if let Some(local) = session.imported.get(&key) {
            return Ok(*local);
        }

        // Register before copying so cycles resolve to this slot
        let local = self.reserve();
        session.imported.insert(key, local);

        let data = match source.resolve(number)? {
            Some(object) if object.is_in_use() => object.data().clone(),
            _ => Object::Null,
        };
        let data = self.import_value(data, source, session)?;
        self.set_modified_data(local.number(), data);

        tracing::trace!(
            "Imported object {} of file {:?} as {}",
            number,
            source.file_id(),
            local
        );
        Ok(local)
    }

    fn import_value(
        &mut self,
        value: Object,
        source: &mut IndirectObjects,
        session: &mut ImportSession,
    ) -> Result<Object> {
        match value {
            Object::Reference(id) => Ok(Object::Reference(self.import_object(
                source,
                id.number(),
                session,
            )?)),
            Object::Array(items) => items
                .into_iter()
                .map(|item| self.import_value(item, source, session))
                .collect::<Result<Vec<_>>>()
                .map(Object::Array),
            Object::Dictionary(dict) => Ok(Object::Dictionary(
                self.import_dictionary(dict, source, session)?,
            )),
            Object::Stream(stream) => {
                let (dict, body) = stream.into_parts();
                let dict = self.import_dictionary(dict, source, session)?;
                Ok(Object::Stream(Stream::from_parts(dict, body)))
            }
            other => Ok(other),
        }
    }

    fn import_dictionary(
        &mut self,
        dict: Dictionary,
        source: &mut IndirectObjects,
        session: &mut ImportSession,
    ) -> Result<Dictionary> {
        dict.into_iter()
            .map(|(key, value)| Ok((key, self.import_value(value, source, session)?)))
            .collect()
    }
}
