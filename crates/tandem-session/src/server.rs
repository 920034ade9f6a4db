//! Host-side routing: the single serialization point of the session.

use crate::activity::{Activity, ChecksumActivity, FileActivity, FileChange, QueueItem};
use crate::document::LocalDocument;
use crate::error::Result;
use crate::roles::ParticipantDirectory;
use tandem_jupiter::{JupiterServer, TransformationError};
use tandem_ot::{DocumentPath, ParticipantId};
use tracing::debug;

/// Routes activities that editors address to the host.
#[derive(Debug, Default)]
pub struct ConcurrentDocumentServer {
    server: JupiterServer,
}

impl ConcurrentDocumentServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a document with a proxy for every current editor.
    pub fn open_document(&mut self, path: DocumentPath, roles: &dyn ParticipantDirectory) -> bool {
        self.server.open_document(path, roles.editors())
    }

    pub fn close_document(&mut self, path: &DocumentPath) -> bool {
        self.server.close_document(path)
    }

    pub fn is_open(&self, path: &DocumentPath) -> bool {
        self.server.is_open(path)
    }

    /// Number of operations serialized for a document so far.
    pub fn sequence(&self, path: &DocumentPath) -> Option<u64> {
        self.server.document(path).map(|doc| doc.sequence())
    }

    /// Add or drop a participant's proxies after its role changed.
    pub fn role_changed(&mut self, participant: &ParticipantId, roles: &dyn ParticipantDirectory) {
        if roles.can_edit(participant) {
            self.server.add_participant(participant);
        } else {
            self.server.remove_participant(participant);
        }
    }

    pub fn participant_joined(&mut self, participant: &ParticipantId, roles: &dyn ParticipantDirectory) {
        if roles.can_edit(participant) {
            self.server.add_participant(participant);
        }
    }

    pub fn participant_left(&mut self, participant: &ParticipantId) {
        self.server.remove_participant(participant);
    }

    pub fn reset(&mut self, participant: &ParticipantId, path: &DocumentPath) -> Result<()> {
        Ok(self.server.reset(participant, path)?)
    }

    /// Process one activity addressed to the host.
    ///
    /// Returns the activities to deliver; the host itself may be among the
    /// recipients.
    ///
    /// An operation from another editor is checked against the host's copy
    /// in `document` before it is serialized; one that does not fit fails
    /// with [`TransformationError::Rejected`] and is sent to nobody.
    pub fn transform_incoming(
        &mut self,
        activity: &Activity,
        roles: &dyn ParticipantDirectory,
        document: &dyn LocalDocument,
    ) -> Result<Vec<QueueItem>> {
        match activity {
            Activity::Jupiter(jupiter) => {
                let result = if &jupiter.source == roles.local_participant() {
                    // already applied to the host's copy
                    self.server.transform(jupiter)?
                } else {
                    let content = document
                        .content(&jupiter.document_path)
                        .ok_or_else(|| TransformationError::DocumentNotOpen(jupiter.document_path.clone()))?;
                    self.server
                        .transform_checked(jupiter, |op| op.apply(content).map(|_| ()))?
                };
                Ok(result
                    .outgoing
                    .into_iter()
                    .map(|(recipient, outgoing)| QueueItem::to(recipient, Activity::Jupiter(outgoing)))
                    .collect())
            }
            Activity::Checksum(checksum) => self.restamp_checksum(checksum),
            Activity::File(file) => {
                self.file_changed(file, roles);
                Ok(Vec::new())
            }
            Activity::TextEdit(_) | Activity::Stop(_) => Ok(Vec::new()),
        }
    }

    fn restamp_checksum(&mut self, checksum: &ChecksumActivity) -> Result<Vec<QueueItem>> {
        let Some(timestamp) = checksum.timestamp else {
            return Ok(Vec::new());
        };

        let stamps = self
            .server
            .with_timestamp(&checksum.document_path, &checksum.source, timestamp)?;
        let Some(stamps) = stamps else {
            debug!(checksum = %checksum, "dropping stale checksum");
            return Ok(Vec::new());
        };

        Ok(stamps
            .into_iter()
            .map(|(recipient, ts)| {
                QueueItem::to(recipient, Activity::Checksum(checksum.clone().with_timestamp(ts)))
            })
            .collect())
    }

    fn file_changed(&mut self, file: &FileActivity, roles: &dyn ParticipantDirectory) {
        match file.change {
            FileChange::Removed => {
                self.server.close_document(&file.document_path);
            }
            FileChange::Created => {
                self.open_document(file.document_path.clone(), roles);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextBuffers;
    use crate::roles::{Role, Roster};
    use tandem_jupiter::{JupiterActivity, TransformationError};
    use tandem_ot::{Operation, Timestamp};
    use crate::error::SessionError;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    fn doc() -> DocumentPath {
        DocumentPath::new("notes.txt")
    }

    fn host_roster() -> Roster {
        Roster::new(id("host"), id("host"))
            .with("alice", Role::Editor)
            .with("bob", Role::Editor)
            .with("olga", Role::Observer)
    }

    fn served() -> (ConcurrentDocumentServer, Roster, TextBuffers) {
        let roles = host_roster();
        let mut buffers = TextBuffers::new();
        buffers.create(doc(), "").unwrap();
        let mut server = ConcurrentDocumentServer::new();
        server.open_document(doc(), &roles);
        (server, roles, buffers)
    }

    fn insert_from(source: &str, ts: Timestamp, text: &str) -> Activity {
        Activity::Jupiter(JupiterActivity::new(ts, Operation::insert(0, text), doc(), id(source)))
    }

    #[test]
    fn test_operation_fans_out_to_other_editors() {
        let (mut server, roles, buffers) = served();

        let items = server
            .transform_incoming(&insert_from("alice", Timestamp::new(0, 0), "x"), &roles, &buffers)
            .unwrap();

        let recipients: Vec<_> = items.iter().flat_map(|i| i.recipients.clone()).collect();
        // observers are served by the host's client, not by proxies
        assert_eq!(recipients, vec![id("bob"), id("host")]);
        assert_eq!(server.sequence(&doc()), Some(1));
    }

    #[test]
    fn test_observer_operations_are_rejected() {
        let (mut server, roles, buffers) = served();

        let err = server
            .transform_incoming(&insert_from("olga", Timestamp::new(0, 0), "x"), &roles, &buffers)
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transformation(TransformationError::UnknownParticipant { .. })
        ));
    }

    #[test]
    fn test_checksum_restamped_for_each_editor() {
        let (mut server, roles, buffers) = served();
        server
            .transform_incoming(&insert_from("alice", Timestamp::new(0, 0), "x"), &roles, &buffers)
            .unwrap();

        // the host's client has received alice's op
        let checksum = ChecksumActivity::of(id("host"), doc(), "x").with_timestamp(Timestamp::new(0, 1));
        let items = server
            .transform_incoming(&Activity::Checksum(checksum.clone()), &roles, &buffers)
            .unwrap();

        let stamps: Vec<_> = items
            .iter()
            .map(|item| match &item.activity {
                Activity::Checksum(c) => (item.recipients[0].clone(), c.timestamp),
                other => panic!("unexpected {}", other),
            })
            .collect();
        assert_eq!(
            stamps,
            vec![
                (id("alice"), Some(Timestamp::new(0, 1))),
                (id("bob"), Some(Timestamp::new(1, 0))),
            ]
        );

        // before the host's client saw alice's op the checksum is stale
        let stale = checksum.with_timestamp(Timestamp::new(0, 0));
        assert!(server
            .transform_incoming(&Activity::Checksum(stale), &roles, &buffers)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_role_changes_update_proxies() {
        let (mut server, mut roles, buffers) = served();

        roles.set_role(&id("olga"), Role::Editor).unwrap();
        server.role_changed(&id("olga"), &roles);
        let items = server
            .transform_incoming(&insert_from("olga", Timestamp::new(0, 0), "x"), &roles, &buffers)
            .unwrap();
        assert_eq!(items.len(), 3);

        roles.set_role(&id("bob"), Role::Observer).unwrap();
        server.role_changed(&id("bob"), &roles);
        server.participant_left(&id("alice"));
        let items = server
            .transform_incoming(&insert_from("olga", Timestamp::new(1, 0), "y"), &roles, &buffers)
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].recipients, vec![id("host")]);
    }

    #[test]
    fn test_file_removal_closes_document() {
        let (mut server, roles, buffers) = served();
        let removal = Activity::File(FileActivity::removed(id("alice"), doc()));

        assert!(server.transform_incoming(&removal, &roles, &buffers).unwrap().is_empty());
        assert!(!server.is_open(&doc()));

        let created = Activity::File(FileActivity::created(id("alice"), doc()));
        server.transform_incoming(&created, &roles, &buffers).unwrap();
        assert!(server.is_open(&doc()));
    }

    #[test]
    fn test_out_of_range_operation_is_not_relayed() {
        let (mut server, roles, mut buffers) = served();
        buffers.apply_operation(&doc(), &Operation::insert(0, "abc")).unwrap();

        let stray = Activity::Jupiter(JupiterActivity::new(
            Timestamp::new(0, 0),
            Operation::insert(100, "x"),
            doc(),
            id("alice"),
        ));
        assert!(matches!(
            server.transform_incoming(&stray, &roles, &buffers),
            Err(SessionError::Transformation(TransformationError::Rejected(_)))
        ));
        assert_eq!(server.sequence(&doc()), Some(0));

        let items = server
            .transform_incoming(&insert_from("alice", Timestamp::new(0, 0), "x"), &roles, &buffers)
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(server.sequence(&doc()), Some(1));
    }

    #[test]
    fn test_own_operations_skip_the_content_check() {
        let (mut server, roles, buffers) = served();

        // the host applies its edits before they reach the server
        let own = Activity::Jupiter(JupiterActivity::new(
            Timestamp::new(0, 0),
            Operation::insert(5, "later"),
            doc(),
            id("host"),
        ));
        let items = server.transform_incoming(&own, &roles, &buffers).unwrap();
        assert_eq!(items.len(), 2);
    }
}
