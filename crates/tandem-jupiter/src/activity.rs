//! The stamped operation exchanged on a Jupiter channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use tandem_ot::{DocumentPath, Operation, ParticipantId, Timestamp};

/// An operation together with the causal context it was generated in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JupiterActivity {
    /// Sender's view of the channel when the operation was generated.
    pub timestamp: Timestamp,
    pub operation: Operation,
    pub document_path: DocumentPath,
    /// The participant whose edit this operation originates from.
    pub source: ParticipantId,
}

impl JupiterActivity {
    pub fn new(
        timestamp: Timestamp,
        operation: Operation,
        document_path: DocumentPath,
        source: ParticipantId,
    ) -> Self {
        Self {
            timestamp,
            operation,
            document_path,
            source,
        }
    }
}

impl fmt::Display for JupiterActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JupiterActivity({}, {}, {}, {})",
            self.timestamp, self.operation, self.document_path, self.source
        )
    }
}
