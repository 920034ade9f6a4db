//! Pairwise Jupiter timestamps.
//!
//! A full vector clock is unnecessary in a star topology: every channel
//! connects exactly one participant with the host, so each side only counts
//! the operations it generated (`local`) and the ones it received (`remote`)
//! on that channel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The (local, remote) clock of one side of a Jupiter channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Operations generated by this side.
    pub local: u32,
    /// Operations received from the other side.
    pub remote: u32,
}

impl Timestamp {
    pub fn new(local: u32, remote: u32) -> Self {
        Self { local, remote }
    }

    /// The timestamp after generating one more operation.
    pub fn increment_local(self) -> Self {
        Self {
            local: self.local + 1,
            ..self
        }
    }

    /// The timestamp after receiving one more operation.
    pub fn increment_remote(self) -> Self {
        Self {
            remote: self.remote + 1,
            ..self
        }
    }

    /// The same point in time as seen from the other end of the channel.
    pub fn mirrored(self) -> Self {
        Self {
            local: self.remote,
            remote: self.local,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.local, self.remote)
    }
}
