//! A participant's Jupiter channels to the host, one per open document.

use crate::activity::JupiterActivity;
use crate::error::{Result, TransformationError};
use crate::jupiter::Jupiter;
use std::collections::HashMap;
use tandem_ot::{DocumentPath, Operation, ParticipantId, Timestamp};
use tracing::debug;

/// Client side of the Jupiter protocol for every document of one participant.
///
/// Documents are tracked explicitly: every call that names a path which is
/// not open fails with [`TransformationError::DocumentNotOpen`], so that
/// operations still in flight for a reset document are dropped instead of
/// being applied to fresh state.
#[derive(Debug)]
pub struct JupiterClient {
    local: ParticipantId,
    documents: HashMap<DocumentPath, Jupiter>,
}

impl JupiterClient {
    pub fn new(local: ParticipantId) -> Self {
        Self {
            local,
            documents: HashMap::new(),
        }
    }

    pub fn local(&self) -> &ParticipantId {
        &self.local
    }

    /// Start tracking a document. Returns false if it was already open.
    pub fn open(&mut self, path: DocumentPath) -> bool {
        if self.documents.contains_key(&path) {
            return false;
        }
        debug!(path = %path, participant = %self.local, "opening jupiter client");
        self.documents.insert(path, Jupiter::new());
        true
    }

    pub fn is_open(&self, path: &DocumentPath) -> bool {
        self.documents.contains_key(path)
    }

    pub fn open_documents(&self) -> impl Iterator<Item = &DocumentPath> {
        self.documents.keys()
    }

    /// Stamp a local operation for transmission to the host.
    pub fn generate(&mut self, path: &DocumentPath, op: Operation) -> Result<JupiterActivity> {
        let origin = self.local.clone();
        let timestamp = self.channel(path)?.generate(op.clone(), origin.clone());
        Ok(JupiterActivity::new(timestamp, op, path.clone(), origin))
    }

    /// Transform an operation received from the host for local application.
    pub fn receive(&mut self, activity: &JupiterActivity) -> Result<Operation> {
        let jupiter = self.channel(&activity.document_path)?;
        jupiter.receive(
            activity.timestamp,
            activity.operation.clone(),
            &activity.source,
        )
    }

    /// The current timestamp of a document's channel, used to stamp checksums.
    pub fn timestamp(&self, path: &DocumentPath) -> Result<Timestamp> {
        self.documents
            .get(path)
            .map(Jupiter::timestamp)
            .ok_or_else(|| TransformationError::DocumentNotOpen(path.clone()))
    }

    pub fn is_current(&mut self, path: &DocumentPath, timestamp: Timestamp) -> Result<bool> {
        self.channel(path)?.is_current(timestamp)
    }

    /// Stop tracking a document, discarding its outstanding operations.
    pub fn reset(&mut self, path: &DocumentPath) -> bool {
        debug!(path = %path, participant = %self.local, "resetting jupiter client");
        self.documents.remove(path).is_some()
    }

    pub fn reset_all(&mut self) {
        debug!(participant = %self.local, documents = self.documents.len(), "resetting all jupiter clients");
        self.documents.clear();
    }

    fn channel(&mut self, path: &DocumentPath) -> Result<&mut Jupiter> {
        self.documents
            .get_mut(path)
            .ok_or_else(|| TransformationError::DocumentNotOpen(path.clone()))
    }
}
