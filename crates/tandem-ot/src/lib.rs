//! # tandem-ot
//!
//! Value types for the Tandem operational-transformation engine.
//!
//! This crate provides:
//! - [`Operation`]: insert, delete, sequential split and no-op edits
//! - Inclusion transformation between concurrent operations
//! - [`Timestamp`]: the pairwise (local, remote) clock of one Jupiter channel
//! - Participant and document identifiers shared by every layer above
//!
//! ## Transformation diamond
//!
//! For two operations `a` and `b` generated on the same document state,
//! with `t = Tie::between(origin_a, origin_b)`:
//!
//! ```text
//! apply(apply(doc, a), b.transform(&a, t.flip())) == apply(apply(doc, b), a.transform(&b, t))
//! ```
//!
//! ## Example
//!
//! ```rust
//! use tandem_ot::{Operation, Tie};
//!
//! let a = Operation::insert(0, "foo");
//! let b = Operation::insert(0, "bar");
//!
//! let left = b.transform(&a, Tie::Shift).apply(&a.apply("").unwrap()).unwrap();
//! let right = a.transform(&b, Tie::Keep).apply(&b.apply("").unwrap()).unwrap();
//! assert_eq!(left, right);
//! assert_eq!(left, "foobar");
//! ```

pub mod error;
pub mod ids;
pub mod operation;
pub mod timestamp;

pub use error::OperationError;
pub use ids::{DocumentPath, ParticipantId};
pub use operation::{Operation, Tie};
pub use timestamp::Timestamp;
