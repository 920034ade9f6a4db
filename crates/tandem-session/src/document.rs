//! Local document contents.

use crate::error::{Result, SessionError};
use std::collections::BTreeMap;
use tandem_ot::{DocumentPath, Operation};

/// Where transformed operations are finally applied.
pub trait LocalDocument {
    /// Apply an operation. Nothing is changed if it does not fit.
    fn apply_operation(&mut self, path: &DocumentPath, op: &Operation) -> Result<()>;

    fn content(&self, path: &DocumentPath) -> Option<&str>;
}

/// In-memory text buffers keyed by path.
#[derive(Debug, Default, Clone)]
pub struct TextBuffers {
    buffers: BTreeMap<DocumentPath, String>,
}

impl TextBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, path: DocumentPath, content: impl Into<String>) -> Result<()> {
        if self.buffers.contains_key(&path) {
            return Err(SessionError::DocumentExists(path));
        }
        self.buffers.insert(path, content.into());
        Ok(())
    }

    pub fn remove(&mut self, path: &DocumentPath) -> Option<String> {
        self.buffers.remove(path)
    }

    pub fn contains(&self, path: &DocumentPath) -> bool {
        self.buffers.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &DocumentPath> {
        self.buffers.keys()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl LocalDocument for TextBuffers {
    fn apply_operation(&mut self, path: &DocumentPath, op: &Operation) -> Result<()> {
        let buffer = self
            .buffers
            .get_mut(path)
            .ok_or_else(|| SessionError::DocumentNotFound(path.clone()))?;
        *buffer = op.apply(buffer)?;
        Ok(())
    }

    fn content(&self, path: &DocumentPath) -> Option<&str> {
        self.buffers.get(path).map(String::as_str)
    }
}
