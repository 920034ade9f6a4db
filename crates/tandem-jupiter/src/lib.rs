//! Tandem Jupiter - client/server operational transformation
//!
//! This crate implements the Jupiter algorithm on a star topology:
//! - [`Jupiter`]: the pairwise state machine of one channel
//! - [`JupiterClient`]: a participant's channels to the host, one per document
//! - [`JupiterServer`]: the host's proxies, one per (document, editor)
//! - [`simulation::StarCluster`]: an in-memory star network for testing
//!
//! # Algorithm
//!
//! ```text
//! On local operation op:
//!   send (op, [local, remote]) to the other side
//!   outstanding.push((op, local))
//!   local += 1
//!
//! On receive (op, [l, r]) from the other side:
//!   require l == remote                   // no gaps, no duplicates
//!   drop outstanding entries with count < r  // acknowledged
//!   for each outstanding entry e (oldest first):
//!     (op, e.op) = (op ↑ e.op, e.op ↑ op)
//!   remote += 1
//!   apply op
//! ```
//!
//! The host serializes every document: an operation from one editor is
//! received through that editor's proxy, assigned the next global sequence
//! number, and then generated through every other editor's proxy.
//!
//! # Example
//!
//! ```rust
//! use tandem_jupiter::simulation::StarCluster;
//! use tandem_ot::Operation;
//!
//! let mut cluster = StarCluster::new(&["alice", "bob"], "");
//! cluster.edit(0, Operation::insert(0, "foo")).unwrap();
//! cluster.edit(1, Operation::insert(0, "bar")).unwrap();
//! cluster.flush().unwrap();
//!
//! assert!(cluster.is_converged());
//! assert_eq!(cluster.server_content(), "foobar");
//! ```

pub mod activity;
pub mod client;
pub mod error;
pub mod jupiter;
pub mod server;
pub mod simulation;

// Re-export main types for convenience
pub use activity::JupiterActivity;
pub use client::JupiterClient;
pub use error::{Result, TransformationError};
pub use jupiter::{ChannelState, Jupiter};
pub use server::{JupiterDocumentServer, JupiterServer, ServerTransform};
