//! The host's side of the Jupiter protocol.
//!
//! For every open document the host keeps one proxy [`Jupiter`] per editing
//! participant, mirroring that participant's client. All operations for a
//! document pass through its [`JupiterDocumentServer`], which is the single
//! point that decides their global order.

use crate::activity::JupiterActivity;
use crate::error::{Result, TransformationError};
use crate::jupiter::Jupiter;
use std::collections::{BTreeMap, HashMap};
use tandem_ot::{DocumentPath, Operation, OperationError, ParticipantId, Timestamp};
use tracing::debug;

/// Result of serializing one incoming operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerTransform {
    /// Global position of the operation in the document's history (1-based).
    pub sequence: u64,
    /// The operation in the host's document state.
    pub operation: Operation,
    /// Re-stamped copies, one per other editor.
    pub outgoing: Vec<(ParticipantId, JupiterActivity)>,
}

/// Proxies and global order for one document.
#[derive(Debug)]
pub struct JupiterDocumentServer {
    path: DocumentPath,
    proxies: BTreeMap<ParticipantId, Jupiter>,
    sequence: u64,
}

impl JupiterDocumentServer {
    pub fn new(path: DocumentPath) -> Self {
        Self {
            path,
            proxies: BTreeMap::new(),
            sequence: 0,
        }
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Number of operations serialized so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Add a proxy for a participant. Returns false if one already exists.
    pub fn add_proxy(&mut self, participant: ParticipantId) -> bool {
        if self.proxies.contains_key(&participant) {
            return false;
        }
        self.proxies.insert(participant, Jupiter::new());
        true
    }

    pub fn remove_proxy(&mut self, participant: &ParticipantId) -> bool {
        self.proxies.remove(participant).is_some()
    }

    /// Restart a participant's channel from zero, as after a resync.
    pub fn reset_proxy(&mut self, participant: &ParticipantId) -> Result<()> {
        self.proxy(participant)?.reset();
        Ok(())
    }

    pub fn has_proxy(&self, participant: &ParticipantId) -> bool {
        self.proxies.contains_key(participant)
    }

    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> {
        self.proxies.keys()
    }

    /// Receive an operation through its source's proxy and fan it out.
    pub fn transform(&mut self, activity: &JupiterActivity) -> Result<ServerTransform> {
        self.transform_checked(activity, |_| Ok(()))
    }

    /// Like [`transform`](Self::transform), but the transformed operation is
    /// only serialized if `check` accepts it against the host's content.
    ///
    /// A rejected operation gets no sequence number, is sent to nobody and
    /// leaves the source's proxy as it was.
    pub fn transform_checked<F>(&mut self, activity: &JupiterActivity, check: F) -> Result<ServerTransform>
    where
        F: FnOnce(&Operation) -> std::result::Result<(), OperationError>,
    {
        let source = &activity.source;
        let proxy = self.proxy(source)?;
        let before = proxy.clone();
        let op = proxy.receive(activity.timestamp, activity.operation.clone(), source)?;
        if let Err(err) = check(&op) {
            *proxy = before;
            debug!(path = %self.path, source = %source, op = %op, error = %err, "rejected operation");
            return Err(err.into());
        }

        self.sequence += 1;
        debug!(
            path = %self.path,
            source = %source,
            sequence = self.sequence,
            op = %op,
            "serialized operation"
        );

        let mut outgoing = Vec::with_capacity(self.proxies.len().saturating_sub(1));
        for (participant, proxy) in self.proxies.iter_mut() {
            if participant == source {
                continue;
            }
            let timestamp = proxy.generate(op.clone(), source.clone());
            outgoing.push((
                participant.clone(),
                JupiterActivity::new(timestamp, op.clone(), self.path.clone(), source.clone()),
            ));
        }

        Ok(ServerTransform {
            sequence: self.sequence,
            operation: op,
            outgoing,
        })
    }

    /// Validate a checksum stamped by `source` and re-stamp it for every
    /// other editor.
    ///
    /// Returns `None` when the checksum is stale on the source's channel.
    pub fn with_timestamp(
        &mut self,
        source: &ParticipantId,
        timestamp: Timestamp,
    ) -> Result<Option<Vec<(ParticipantId, Timestamp)>>> {
        if !self.proxy(source)?.is_current(timestamp)? {
            return Ok(None);
        }
        Ok(Some(
            self.proxies
                .iter()
                .filter(|(participant, _)| *participant != source)
                .map(|(participant, proxy)| (participant.clone(), proxy.timestamp()))
                .collect(),
        ))
    }

    fn proxy(&mut self, participant: &ParticipantId) -> Result<&mut Jupiter> {
        self.proxies
            .get_mut(participant)
            .ok_or_else(|| TransformationError::UnknownParticipant {
                participant: participant.clone(),
                path: self.path.clone(),
            })
    }
}

/// All documents served by the host.
#[derive(Debug, Default)]
pub struct JupiterServer {
    documents: HashMap<DocumentPath, JupiterDocumentServer>,
}

impl JupiterServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin serving a document with a proxy for each editor.
    ///
    /// Returns false if the document was already open; its proxies are kept.
    pub fn open_document(
        &mut self,
        path: DocumentPath,
        editors: impl IntoIterator<Item = ParticipantId>,
    ) -> bool {
        if self.documents.contains_key(&path) {
            return false;
        }
        let mut server = JupiterDocumentServer::new(path.clone());
        for editor in editors {
            server.add_proxy(editor);
        }
        debug!(path = %path, editors = server.proxies.len(), "serving document");
        self.documents.insert(path, server);
        true
    }

    pub fn close_document(&mut self, path: &DocumentPath) -> bool {
        self.documents.remove(path).is_some()
    }

    pub fn is_open(&self, path: &DocumentPath) -> bool {
        self.documents.contains_key(path)
    }

    pub fn document(&self, path: &DocumentPath) -> Option<&JupiterDocumentServer> {
        self.documents.get(path)
    }

    pub fn open_documents(&self) -> impl Iterator<Item = &DocumentPath> {
        self.documents.keys()
    }

    /// Give a participant a channel on every open document.
    pub fn add_participant(&mut self, participant: &ParticipantId) {
        for server in self.documents.values_mut() {
            server.add_proxy(participant.clone());
        }
    }

    /// Drop a participant's channels on every document.
    pub fn remove_participant(&mut self, participant: &ParticipantId) {
        for server in self.documents.values_mut() {
            server.remove_proxy(participant);
        }
    }

    /// Restart one participant's channel for one document.
    pub fn reset(&mut self, participant: &ParticipantId, path: &DocumentPath) -> Result<()> {
        debug!(path = %path, participant = %participant, "resetting jupiter proxy");
        self.document_mut(path)?.reset_proxy(participant)
    }

    pub fn transform(&mut self, activity: &JupiterActivity) -> Result<ServerTransform> {
        self.document_mut(&activity.document_path)?.transform(activity)
    }

    pub fn transform_checked<F>(&mut self, activity: &JupiterActivity, check: F) -> Result<ServerTransform>
    where
        F: FnOnce(&Operation) -> std::result::Result<(), OperationError>,
    {
        self.document_mut(&activity.document_path)?
            .transform_checked(activity, check)
    }

    pub fn with_timestamp(
        &mut self,
        path: &DocumentPath,
        source: &ParticipantId,
        timestamp: Timestamp,
    ) -> Result<Option<Vec<(ParticipantId, Timestamp)>>> {
        self.document_mut(path)?.with_timestamp(source, timestamp)
    }

    fn document_mut(&mut self, path: &DocumentPath) -> Result<&mut JupiterDocumentServer> {
        self.documents
            .get_mut(path)
            .ok_or_else(|| TransformationError::DocumentNotOpen(path.clone()))
    }
}
