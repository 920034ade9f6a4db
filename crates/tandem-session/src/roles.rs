//! Who is in the session and who may edit.

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tandem_ot::ParticipantId;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May generate edits.
    Editor,
    /// Only receives and applies edits.
    Observer,
}

/// Read access to the session's participants as seen from one of them.
pub trait ParticipantDirectory {
    fn local_participant(&self) -> &ParticipantId;

    fn host(&self) -> &ParticipantId;

    fn role(&self, participant: &ParticipantId) -> Option<Role>;

    /// All participants, the local one included, in id order.
    fn participants(&self) -> Vec<ParticipantId>;

    fn is_host(&self) -> bool {
        self.local_participant() == self.host()
    }

    fn can_edit(&self, participant: &ParticipantId) -> bool {
        self.role(participant) == Some(Role::Editor)
    }

    fn remote_users(&self) -> Vec<ParticipantId> {
        self.participants()
            .into_iter()
            .filter(|p| p != self.local_participant())
            .collect()
    }

    fn observers(&self) -> Vec<ParticipantId> {
        self.participants()
            .into_iter()
            .filter(|p| self.role(p) == Some(Role::Observer))
            .collect()
    }

    fn remote_observers(&self) -> Vec<ParticipantId> {
        self.observers()
            .into_iter()
            .filter(|p| p != self.local_participant())
            .collect()
    }

    fn editors(&self) -> Vec<ParticipantId> {
        self.participants()
            .into_iter()
            .filter(|p| self.can_edit(p))
            .collect()
    }
}

/// In-memory participant directory.
///
/// The host is always a member and always an editor.
#[derive(Clone, Debug)]
pub struct Roster {
    local: ParticipantId,
    host: ParticipantId,
    roles: BTreeMap<ParticipantId, Role>,
}

impl Roster {
    pub fn new(local: ParticipantId, host: ParticipantId) -> Self {
        let mut roles = BTreeMap::new();
        roles.insert(host.clone(), Role::Editor);
        Self { local, host, roles }
    }

    /// Builder-style [`Roster::join`].
    pub fn with(mut self, participant: impl Into<ParticipantId>, role: Role) -> Self {
        self.join(participant.into(), role);
        self
    }

    /// Add a participant. Returns false if it was already a member.
    pub fn join(&mut self, participant: ParticipantId, role: Role) -> bool {
        if self.roles.contains_key(&participant) {
            return false;
        }
        debug!(participant = %participant, role = ?role, "participant joined");
        self.roles.insert(participant, role);
        true
    }

    /// Remove a participant. The host cannot leave.
    pub fn leave(&mut self, participant: &ParticipantId) -> bool {
        if participant == &self.host {
            return false;
        }
        self.roles.remove(participant).is_some()
    }

    pub fn set_role(&mut self, participant: &ParticipantId, role: Role) -> Result<()> {
        if participant == &self.host && role != Role::Editor {
            return Err(SessionError::HostRoleFixed);
        }
        let current = self
            .roles
            .get_mut(participant)
            .ok_or_else(|| SessionError::UnknownParticipant(participant.clone()))?;
        *current = role;
        Ok(())
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.roles.contains_key(participant)
    }
}

impl ParticipantDirectory for Roster {
    fn local_participant(&self) -> &ParticipantId {
        &self.local
    }

    fn host(&self) -> &ParticipantId {
        &self.host
    }

    fn role(&self, participant: &ParticipantId) -> Option<Role> {
        self.roles.get(participant).copied()
    }

    fn participants(&self) -> Vec<ParticipantId> {
        self.roles.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    fn roster(local: &str) -> Roster {
        Roster::new(id(local), id("host"))
            .with("alice", Role::Editor)
            .with("olga", Role::Observer)
            .with("oscar", Role::Observer)
    }

    #[test]
    fn test_views_from_host() {
        let roster = roster("host");
        assert!(roster.is_host());
        assert_eq!(roster.remote_users(), vec![id("alice"), id("olga"), id("oscar")]);
        assert_eq!(roster.remote_observers(), vec![id("olga"), id("oscar")]);
        assert_eq!(roster.editors(), vec![id("alice"), id("host")]);
    }

    #[test]
    fn test_views_from_observer() {
        let roster = roster("olga");
        assert!(!roster.is_host());
        assert!(!roster.can_edit(&id("olga")));
        assert_eq!(roster.observers(), vec![id("olga"), id("oscar")]);
        assert_eq!(roster.remote_observers(), vec![id("oscar")]);
    }

    #[test]
    fn test_host_role_is_fixed() {
        let mut roster = roster("host");
        assert_eq!(
            roster.set_role(&id("host"), Role::Observer),
            Err(SessionError::HostRoleFixed)
        );
        assert!(!roster.leave(&id("host")));

        roster.set_role(&id("olga"), Role::Editor).unwrap();
        assert!(roster.can_edit(&id("olga")));
        assert!(matches!(
            roster.set_role(&id("nobody"), Role::Editor),
            Err(SessionError::UnknownParticipant(_))
        ));
    }
}
