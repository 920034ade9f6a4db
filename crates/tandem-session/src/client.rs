//! Per-participant routing of activities through Jupiter.
//!
//! Outgoing text edits are stamped and sent to the host; incoming stamped
//! operations are transformed against what this participant has not yet
//! had acknowledged. On the host this client also relays edits to
//! observers, who never run the transformation themselves.

use crate::activity::{Activity, ChecksumActivity, FileChange, QueueItem, TextEditActivity};
use crate::error::{Result, SessionError};
use crate::roles::ParticipantDirectory;
use tandem_jupiter::{JupiterActivity, JupiterClient};
use tandem_ot::{DocumentPath, ParticipantId, Timestamp};
use tracing::{debug, warn};

/// A document that could not be processed and needs a consistency check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryRequest {
    pub path: DocumentPath,
    pub reason: String,
}

/// Outcome of processing a batch of incoming activities.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformationResult {
    /// Activities to execute on the local documents, in order.
    pub execute_locally: Vec<Activity>,
    /// Activities to relay to other participants.
    pub send: Vec<QueueItem>,
    pub recovery: Vec<RecoveryRequest>,
}

impl TransformationResult {
    pub fn is_empty(&self) -> bool {
        self.execute_locally.is_empty() && self.send.is_empty() && self.recovery.is_empty()
    }
}

/// Activity routing for one participant.
#[derive(Debug)]
pub struct ConcurrentDocumentClient {
    jupiter: JupiterClient,
}

impl ConcurrentDocumentClient {
    pub fn new(local: ParticipantId) -> Self {
        Self {
            jupiter: JupiterClient::new(local),
        }
    }

    pub fn local(&self) -> &ParticipantId {
        self.jupiter.local()
    }

    pub fn open_document(&mut self, path: DocumentPath) -> bool {
        self.jupiter.open(path)
    }

    pub fn close_document(&mut self, path: &DocumentPath) -> bool {
        self.jupiter.reset(path)
    }

    pub fn is_open(&self, path: &DocumentPath) -> bool {
        self.jupiter.is_open(path)
    }

    pub fn timestamp(&self, path: &DocumentPath) -> Result<Timestamp> {
        Ok(self.jupiter.timestamp(path)?)
    }

    /// Restart a document's channel from zero and keep it open.
    ///
    /// Unlike [`close_document`](Self::close_document), this does not fail
    /// closed: the path keeps accepting activities stamped on the new
    /// channel, while anything still in flight for the old one is rejected
    /// by its timestamp checks.
    pub fn resync(&mut self, path: &DocumentPath) -> bool {
        if !self.jupiter.reset(path) {
            return false;
        }
        self.jupiter.open(path.clone())
    }

    /// React to a role change of any participant.
    ///
    /// A participant that is not the host resets all its channels when its
    /// own role changes.
    pub fn role_changed(&mut self, participant: &ParticipantId, roles: &dyn ParticipantDirectory) {
        if roles.is_host() || participant != roles.local_participant() {
            return;
        }
        let paths: Vec<DocumentPath> = self.jupiter.open_documents().cloned().collect();
        for path in paths {
            self.resync(&path);
        }
    }

    /// True if a checksum's stamp matches this participant's channel.
    pub fn is_current(&mut self, checksum: &ChecksumActivity) -> Result<bool> {
        match checksum.timestamp {
            Some(ts) => Ok(self.jupiter.is_current(&checksum.document_path, ts)?),
            None => Ok(false),
        }
    }

    /// Route a locally generated activity.
    pub fn transform_outgoing(
        &mut self,
        activity: Activity,
        roles: &dyn ParticipantDirectory,
    ) -> Result<Vec<QueueItem>> {
        let mut items = Vec::new();

        match activity {
            Activity::TextEdit(edit) => {
                let stamped = self
                    .jupiter
                    .generate(&edit.document_path, edit.to_operation())?;
                items.push(QueueItem::to(roles.host().clone(), Activity::Jupiter(stamped)));

                // the host's own edits never come back through the server
                if roles.is_host() {
                    push_if_any(&mut items, roles.remote_observers(), Activity::TextEdit(edit));
                }
            }
            Activity::Checksum(checksum) => {
                if !roles.is_host() {
                    return Err(SessionError::ChecksumNotAuthorized(self.local().clone()));
                }
                let ts = self.jupiter.timestamp(&checksum.document_path)?;
                items.push(QueueItem::to(
                    roles.host().clone(),
                    Activity::Checksum(checksum.clone().with_timestamp(ts)),
                ));
                push_if_any(
                    &mut items,
                    roles.remote_observers(),
                    Activity::Checksum(checksum.without_timestamp()),
                );
            }
            Activity::Stop(stop) => {
                let recipient = stop.recipient()?.clone();
                items.push(QueueItem::to(recipient, Activity::Stop(stop)));
            }
            other => push_if_any(&mut items, roles.remote_users(), other),
        }

        Ok(items)
    }

    /// Process a batch of incoming activities.
    ///
    /// A failure on one activity is logged and reported as a recovery
    /// request; the rest of the batch is still processed.
    pub fn transform_incoming(
        &mut self,
        activities: impl IntoIterator<Item = Activity>,
        roles: &dyn ParticipantDirectory,
    ) -> TransformationResult {
        let mut result = TransformationResult::default();

        for activity in activities {
            self.housekeeping(&activity);

            match activity {
                Activity::Jupiter(jupiter) => {
                    if let Err(err) = self.receive_jupiter(&jupiter, roles, &mut result) {
                        fail(&mut result, &jupiter.document_path, err);
                    }
                }
                Activity::Checksum(checksum) if roles.can_edit(roles.local_participant()) => {
                    match self.is_current(&checksum) {
                        Ok(true) => result.execute_locally.push(Activity::Checksum(checksum)),
                        Ok(false) => debug!(checksum = %checksum, "dropping stale checksum"),
                        Err(err) => fail(&mut result, &checksum.document_path, err),
                    }
                }
                other => result.execute_locally.push(other),
            }
        }

        result
    }

    fn receive_jupiter(
        &mut self,
        activity: &JupiterActivity,
        roles: &dyn ParticipantDirectory,
        result: &mut TransformationResult,
    ) -> Result<()> {
        let op = self.jupiter.receive(activity)?;
        let edits = TextEditActivity::from_operation(&op, &activity.document_path, &activity.source);

        let observers = if roles.is_host() {
            roles.remote_observers()
        } else {
            Vec::new()
        };

        for edit in edits {
            if !observers.is_empty() {
                result
                    .send
                    .push(QueueItem::new(observers.clone(), Activity::TextEdit(edit.clone())));
            }
            result.execute_locally.push(Activity::TextEdit(edit));
        }
        Ok(())
    }

    /// Runs before an activity is transformed, so that a removed document
    /// is reset before anything later in the batch reaches its channel.
    fn housekeeping(&mut self, activity: &Activity) {
        let Activity::File(file) = activity else {
            return;
        };
        match file.change {
            FileChange::Removed => {
                self.jupiter.reset(&file.document_path);
            }
            FileChange::Created => {
                self.jupiter.open(file.document_path.clone());
            }
        }
    }
}

fn push_if_any(items: &mut Vec<QueueItem>, recipients: Vec<ParticipantId>, activity: Activity) {
    if !recipients.is_empty() {
        items.push(QueueItem::new(recipients, activity));
    }
}

fn fail(result: &mut TransformationResult, path: &DocumentPath, err: SessionError) {
    warn!(path = %path, error = %err, "failed to transform incoming activity");
    result.recovery.push(RecoveryRequest {
        path: path.clone(),
        reason: err.to_string(),
    });
}
