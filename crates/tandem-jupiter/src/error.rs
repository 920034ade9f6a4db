//! Transformation failures.

use tandem_ot::{DocumentPath, OperationError, ParticipantId};
use thiserror::Error;

/// An operation could not be reconciled against the channel state.
///
/// The offending operation must be dropped, never applied partially.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformationError {
    #[error("Document not open: {0}")]
    DocumentNotOpen(DocumentPath),

    #[error("Incorrect operation count: expected {expected}, found {found}")]
    TimestampMismatch { expected: u32, found: u32 },

    #[error("Acknowledged {acknowledged} operations but only {generated} were generated")]
    AcknowledgedUnknown { acknowledged: u32, generated: u32 },

    #[error("Acknowledged count {acknowledged} is older than outstanding operation {oldest}")]
    AcknowledgedTooOld { acknowledged: u32, oldest: u32 },

    #[error("Operation does not fit the host's document: {0}")]
    Rejected(#[from] OperationError),

    #[error("No channel for participant {participant} on {path}")]
    UnknownParticipant {
        participant: ParticipantId,
        path: DocumentPath,
    },
}

pub type Result<T> = std::result::Result<T, TransformationError>;
