//! Stop/lock handshake.
//!
//! A participant (usually the host) asks another to stop generating edits
//! while something synchronization-sensitive happens, and later to resume.
//! Each request is acknowledged by its target.

use crate::error::ActivityError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tandem_ot::ParticipantId;
use tracing::{debug, warn};
use ulid::Ulid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopKind {
    Lock,
    Unlock,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopState {
    Initiated,
    Acknowledged,
    /// A state this build does not know, decoded from the wire.
    #[serde(other)]
    Unknown,
}

/// A lock or unlock request, or its acknowledgment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopActivity {
    pub source: ParticipantId,
    /// Who asked for the lock/unlock.
    pub initiator: ParticipantId,
    /// Who is locked/unlocked.
    pub target: ParticipantId,
    pub kind: StopKind,
    pub state: StopState,
    pub request_id: String,
}

impl StopActivity {
    /// A fresh request from `initiator` with a new id.
    pub fn new(initiator: ParticipantId, target: ParticipantId, kind: StopKind) -> Self {
        Self {
            source: initiator.clone(),
            initiator,
            target,
            kind,
            state: StopState::Initiated,
            request_id: Ulid::new().to_string(),
        }
    }

    /// The participant this activity must be delivered to.
    pub fn recipient(&self) -> Result<&ParticipantId, ActivityError> {
        match self.state {
            StopState::Initiated => Ok(&self.target),
            StopState::Acknowledged => Ok(&self.initiator),
            StopState::Unknown => Err(ActivityError::IllegalRecipientState {
                request_id: self.request_id.clone(),
            }),
        }
    }

    /// The acknowledgment of this request, sent by `source`.
    pub fn generate_acknowledgment(&self, source: ParticipantId) -> Self {
        Self {
            source,
            state: StopState::Acknowledged,
            ..self.clone()
        }
    }
}

impl fmt::Display for StopActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StopActivity(id: {}, kind: {:?}, state: {:?}, initiator: {}, target: {}, src: {})",
            self.request_id, self.kind, self.state, self.initiator, self.target, self.source
        )
    }
}

/// Outcome of handling a stop activity addressed to this participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// We were locked or unlocked; the acknowledgment must be sent back.
    Applied(StopActivity),
    /// One of our requests was acknowledged.
    Acknowledged(StopActivity),
    /// Addressed to someone else, or an acknowledgment we did not wait for.
    Ignored,
}

/// Tracks our own requests and who currently holds a lock on us.
#[derive(Debug)]
pub struct StopManager {
    local: ParticipantId,
    locked_by: BTreeSet<ParticipantId>,
    pending: HashMap<(StopKind, String), StopActivity>,
}

impl StopManager {
    pub fn new(local: ParticipantId) -> Self {
        Self {
            local,
            locked_by: BTreeSet::new(),
            pending: HashMap::new(),
        }
    }

    /// Create a request and remember it until it is acknowledged.
    pub fn request(&mut self, kind: StopKind, target: ParticipantId) -> StopActivity {
        let activity = StopActivity::new(self.local.clone(), target, kind);
        self.pending
            .insert((kind, activity.request_id.clone()), activity.clone());
        activity
    }

    pub fn handle(&mut self, activity: &StopActivity) -> Result<StopOutcome, ActivityError> {
        if activity.recipient()? != &self.local {
            return Ok(StopOutcome::Ignored);
        }

        match activity.state {
            StopState::Initiated => {
                match activity.kind {
                    StopKind::Lock => {
                        self.locked_by.insert(activity.initiator.clone());
                    }
                    StopKind::Unlock => {
                        self.locked_by.remove(&activity.initiator);
                    }
                }
                debug!(
                    initiator = %activity.initiator,
                    kind = ?activity.kind,
                    locked = self.is_locked(),
                    "applied stop request"
                );
                Ok(StopOutcome::Applied(
                    activity.generate_acknowledgment(self.local.clone()),
                ))
            }
            _ => {
                let key = (activity.kind, activity.request_id.clone());
                match self.pending.remove(&key) {
                    Some(_) => Ok(StopOutcome::Acknowledged(activity.clone())),
                    None => {
                        warn!(request_id = %activity.request_id, "unexpected stop acknowledgment");
                        Ok(StopOutcome::Ignored)
                    }
                }
            }
        }
    }

    /// True while any participant holds a lock on us.
    pub fn is_locked(&self) -> bool {
        !self.locked_by.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
