//! Error types for applying operations to document content.

use thiserror::Error;

/// Errors raised when an operation does not fit the content it is applied to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("Position out of bounds: {position} (length: {length})")]
    OutOfBounds { position: usize, length: usize },

    #[error("Deleted text mismatch at {position}: expected {expected:?}, found {found:?}")]
    TextMismatch {
        position: usize,
        expected: String,
        found: String,
    },
}

pub type Result<T> = std::result::Result<T, OperationError>;
