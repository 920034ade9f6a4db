//! Tandem Session - concurrent document management
//!
//! This crate puts the Jupiter engine to work in a session of participants
//! connected in a star around the host:
//!
//! - [`activity`] - Messages exchanged between participants and their wire codec
//! - [`client`] - Per-participant routing through Jupiter
//! - [`server`] - The host's serialization point
//! - [`consistency`] - Checksum comparison against the host's copy
//! - [`stop`] - Lock/unlock handshake
//! - [`roles`] - Participants and edit rights
//! - [`transport`] - Delivery of activities
//! - [`session`] - The single-writer actor tying it together
//!
//! # Quick Start
//!
//! ```rust
//! use tandem_session::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> tandem_session::Result<()> {
//!     let network = create_network(["host", "alice"]);
//!     let roster = |local: &str| Roster::new(local.into(), "host".into()).with("alice", Role::Editor);
//!
//!     let host = SessionActor::spawn(SessionConfig::default(), roster("host"), network[0].clone())?;
//!     let alice = SessionActor::spawn(SessionConfig::default(), roster("alice"), network[1].clone())?;
//!
//!     host.open_document("notes.txt", "").await?;
//!     alice.open_document("notes.txt", "").await?;
//!
//!     host.insert("notes.txt", 0, "foo").await?;
//!     alice.insert("notes.txt", 0, "bar").await?;
//!     settle(&[host.clone(), alice.clone()]).await?;
//!
//!     assert_eq!(host.content("notes.txt").await?, alice.content("notes.txt").await?);
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod client;
pub mod config;
pub mod consistency;
pub mod document;
pub mod error;
pub mod roles;
pub mod server;
pub mod session;
pub mod stop;
pub mod transport;

// Re-exports for convenience
pub use activity::{
    decode, encode, Activity, ChecksumActivity, FileActivity, FileChange, QueueItem,
    TextEditActivity,
};
pub use client::{ConcurrentDocumentClient, RecoveryRequest, TransformationResult};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use consistency::ConsistencyWatchdog;
pub use document::{LocalDocument, TextBuffers};
pub use error::{ActivityError, ConsistencyError, Result, SessionError};
pub use roles::{ParticipantDirectory, Role, Roster};
pub use server::ConcurrentDocumentServer;
pub use session::{settle, SessionActor, SessionEvent, SessionHandle};
pub use stop::{StopActivity, StopKind, StopManager, StopOutcome, StopState};
pub use transport::{create_network, ActivityTransport, Envelope, MemoryTransport, TransportError};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{SessionConfig, SessionConfigBuilder};
    pub use crate::error::SessionError;
    pub use crate::roles::{ParticipantDirectory, Role, Roster};
    pub use crate::session::{settle, SessionActor, SessionEvent, SessionHandle};
    pub use crate::transport::{create_network, ActivityTransport, MemoryTransport};
    pub use tandem_ot::{DocumentPath, Operation, ParticipantId};
}
