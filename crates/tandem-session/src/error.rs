//! Error types for concurrent document management.

use tandem_jupiter::TransformationError;
use tandem_ot::{DocumentPath, OperationError, ParticipantId};
use thiserror::Error;

/// Errors around individual activities and their wire form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivityError {
    #[error("Stop activity {request_id} has no recipient in its current state")]
    IllegalRecipientState { request_id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ActivityError {
    fn from(err: serde_json::Error) -> Self {
        ActivityError::Serialization(err.to_string())
    }
}

/// A document whose content disagrees with the host's.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("Checksum mismatch for {path}: host has {expected_length} chars, local has {actual_length}")]
    ChecksumMismatch {
        path: DocumentPath,
        expected_length: usize,
        actual_length: usize,
    },

    #[error("Checksum received for missing document: {0}")]
    MissingDocument(DocumentPath),
}

/// Errors raised by the session layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Transformation(#[from] TransformationError),

    #[error(transparent)]
    Activity(#[from] ActivityError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error("Edit does not fit the document: {0}")]
    Apply(#[from] OperationError),

    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentPath),

    #[error("Document already exists: {0}")]
    DocumentExists(DocumentPath),

    #[error("Only the host may generate checksums, not {0}")]
    ChecksumNotAuthorized(ParticipantId),

    #[error("Participant {0} may not edit")]
    NotAuthorized(ParticipantId),

    #[error("Participant is locked")]
    Locked,

    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    #[error("The host always keeps edit rights")]
    HostRoleFixed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session actor has shut down")]
    ActorClosed,
}

pub type Result<T> = std::result::Result<T, SessionError>;
