//! The single-writer session actor.
//!
//! All Jupiter state of a participant lives inside one tokio task. Callers
//! talk to it through a [`SessionHandle`], which sends commands over a
//! channel and waits for the reply; activities from other participants
//! arrive on the transport's channel and are processed by the same task.
//! Nothing else can reach the state machines, so they are never mutated
//! concurrently.

use crate::activity::{Activity, ChecksumActivity, FileActivity, FileChange, QueueItem, TextEditActivity};
use crate::client::{ConcurrentDocumentClient, TransformationResult};
use crate::config::SessionConfig;
use crate::consistency::ConsistencyWatchdog;
use crate::document::{LocalDocument, TextBuffers};
use crate::error::{Result, SessionError};
use crate::roles::{ParticipantDirectory, Role, Roster};
use crate::server::ConcurrentDocumentServer;
use crate::stop::{StopKind, StopManager, StopOutcome};
use crate::transport::{ActivityTransport, Envelope};
use std::sync::Arc;
use std::time::Duration;
use tandem_jupiter::TransformationError;
use tandem_ot::{DocumentPath, ParticipantId};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Events emitted by a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    DocumentOpened { path: DocumentPath },
    DocumentClosed { path: DocumentPath },
    /// An edit from another participant was applied.
    RemoteEdit {
        path: DocumentPath,
        source: ParticipantId,
    },
    /// A document needs to be resynchronized with the host.
    Inconsistent { path: DocumentPath, reason: String },
    Locked { by: ParticipantId },
    Unlocked { by: ParticipantId },
    /// One of our stop requests was acknowledged by its target.
    StopAcknowledged {
        request_id: String,
        kind: StopKind,
    },
}

enum Command {
    OpenDocument {
        path: DocumentPath,
        content: String,
        reply: oneshot::Sender<Result<()>>,
    },
    CloseDocument {
        path: DocumentPath,
        reply: oneshot::Sender<Result<()>>,
    },
    CreateDocument {
        path: DocumentPath,
        reply: oneshot::Sender<Result<()>>,
    },
    RemoveDocument {
        path: DocumentPath,
        reply: oneshot::Sender<Result<()>>,
    },
    Edit {
        path: DocumentPath,
        offset: usize,
        text: String,
        replaced: String,
        reply: oneshot::Sender<Result<()>>,
    },
    BroadcastChecksums {
        reply: oneshot::Sender<Result<usize>>,
    },
    Stop {
        target: ParticipantId,
        kind: StopKind,
        reply: oneshot::Sender<Result<String>>,
    },
    IsLocked {
        reply: oneshot::Sender<bool>,
    },
    Content {
        path: DocumentPath,
        reply: oneshot::Sender<Option<String>>,
    },
    InconsistentPaths {
        reply: oneshot::Sender<Vec<DocumentPath>>,
    },
    Join {
        participant: ParticipantId,
        role: Role,
        reply: oneshot::Sender<Result<()>>,
    },
    Leave {
        participant: ParticipantId,
        reply: oneshot::Sender<Result<()>>,
    },
    SetRole {
        participant: ParticipantId,
        role: Role,
        reply: oneshot::Sender<Result<()>>,
    },
    Flush {
        reply: oneshot::Sender<u64>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Owns one participant's documents and protocol state.
pub struct SessionActor<T: ActivityTransport> {
    config: SessionConfig,
    roster: Roster,
    transport: Arc<T>,
    client: ConcurrentDocumentClient,
    /// Present on the host only.
    server: Option<ConcurrentDocumentServer>,
    buffers: TextBuffers,
    watchdog: ConsistencyWatchdog,
    stop: StopManager,
    events: broadcast::Sender<SessionEvent>,
    processed: u64,
}

impl<T: ActivityTransport> SessionActor<T> {
    /// Start the actor for `roster`'s local participant on the current
    /// tokio runtime.
    pub fn spawn(config: SessionConfig, roster: Roster, transport: Arc<T>) -> Result<SessionHandle> {
        let local = roster.local_participant().clone();
        if transport.local_id() != &local {
            return Err(SessionError::Transport(format!(
                "transport belongs to {}, not {}",
                transport.local_id(),
                local
            )));
        }
        let incoming = transport
            .subscribe()
            .ok_or_else(|| SessionError::Transport("transport already subscribed".to_string()))?;

        let config = config.sanitized();
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        let actor = SessionActor {
            server: roster.is_host().then(ConcurrentDocumentServer::new),
            client: ConcurrentDocumentClient::new(local.clone()),
            stop: StopManager::new(local.clone()),
            buffers: TextBuffers::new(),
            watchdog: ConsistencyWatchdog::new(),
            events: event_tx.clone(),
            processed: 0,
            config,
            roster,
            transport,
        };

        info!(participant = %local, host = actor.roster.is_host(), "starting session actor");
        tokio::spawn(actor.run(command_rx, incoming));

        Ok(SessionHandle {
            participant: local,
            commands: command_tx,
            events: event_tx,
        })
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut incoming: mpsc::UnboundedReceiver<Envelope>,
    ) {
        let mut checksum_timer =
            tokio::time::interval(Duration::from_millis(self.config.checksum_interval_ms));
        checksum_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let auto_checksum = self.config.auto_checksum && self.roster.is_host();

        loop {
            // incoming first: a command is only handled once the inbox is empty
            tokio::select! {
                biased;
                Some(envelope) = incoming.recv() => self.handle_envelope(envelope).await,
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                _ = checksum_timer.tick(), if auto_checksum => {
                    if let Err(err) = self.broadcast_checksums().await {
                        warn!(error = %err, "checksum broadcast failed");
                    }
                }
            }
        }

        info!(participant = %self.local(), "session actor stopped");
    }

    fn local(&self) -> &ParticipantId {
        self.roster.local_participant()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::OpenDocument {
                path,
                content,
                reply,
            } => {
                let _ = reply.send(self.open_document(path, content));
            }
            Command::CloseDocument { path, reply } => {
                let _ = reply.send(self.close_document(path));
            }
            Command::CreateDocument { path, reply } => {
                let result = self.create_document(path).await;
                let _ = reply.send(result);
            }
            Command::RemoveDocument { path, reply } => {
                let result = self.remove_document(path).await;
                let _ = reply.send(result);
            }
            Command::Edit {
                path,
                offset,
                text,
                replaced,
                reply,
            } => {
                let edit = TextEditActivity::new(self.local().clone(), path, offset, text, replaced);
                let result = self.local_edit(edit).await;
                let _ = reply.send(result);
            }
            Command::BroadcastChecksums { reply } => {
                let result = self.broadcast_checksums().await;
                let _ = reply.send(result);
            }
            Command::Stop {
                target,
                kind,
                reply,
            } => {
                let result = self.request_stop(target, kind).await;
                let _ = reply.send(result);
            }
            Command::IsLocked { reply } => {
                let _ = reply.send(self.stop.is_locked());
            }
            Command::Content { path, reply } => {
                let _ = reply.send(self.buffers.content(&path).map(str::to_string));
            }
            Command::InconsistentPaths { reply } => {
                let _ = reply.send(self.watchdog.inconsistent_paths());
            }
            Command::Join {
                participant,
                role,
                reply,
            } => {
                self.roster.join(participant.clone(), role);
                if let Some(server) = self.server.as_mut() {
                    server.participant_joined(&participant, &self.roster);
                }
                let _ = reply.send(Ok(()));
            }
            Command::Leave { participant, reply } => {
                let result = if self.roster.leave(&participant) {
                    if let Some(server) = self.server.as_mut() {
                        server.participant_left(&participant);
                    }
                    Ok(())
                } else {
                    Err(SessionError::UnknownParticipant(participant))
                };
                let _ = reply.send(result);
            }
            Command::SetRole {
                participant,
                role,
                reply,
            } => {
                let result = self.set_role(&participant, role);
                let _ = reply.send(result);
            }
            Command::Flush { reply } => {
                let _ = reply.send(self.processed);
            }
            // handled by the run loop
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn open_document(&mut self, path: DocumentPath, content: String) -> Result<()> {
        self.buffers.create(path.clone(), content)?;
        self.client.open_document(path.clone());
        if let Some(server) = self.server.as_mut() {
            server.open_document(path.clone(), &self.roster);
        }
        debug!(participant = %self.local(), path = %path, "opened document");
        self.emit(SessionEvent::DocumentOpened { path });
        Ok(())
    }

    /// Stop tracking a document locally.
    fn close_document(&mut self, path: DocumentPath) -> Result<()> {
        if self.buffers.remove(&path).is_none() {
            return Err(SessionError::DocumentNotFound(path));
        }
        self.client.close_document(&path);
        if let Some(server) = self.server.as_mut() {
            server.close_document(&path);
        }
        self.watchdog.clear(&path);
        debug!(participant = %self.local(), path = %path, "closed document");
        self.emit(SessionEvent::DocumentClosed { path });
        Ok(())
    }

    /// Open an empty document here and tell everyone else to do the same.
    async fn create_document(&mut self, path: DocumentPath) -> Result<()> {
        self.open_document(path.clone(), String::new())?;
        let created = Activity::File(FileActivity::created(self.local().clone(), path));
        let items = self.client.transform_outgoing(created, &self.roster)?;
        self.route_from_client(items).await;
        Ok(())
    }

    async fn remove_document(&mut self, path: DocumentPath) -> Result<()> {
        self.close_document(path.clone())?;
        let removed = Activity::File(FileActivity::removed(self.local().clone(), path));
        let items = self.client.transform_outgoing(removed, &self.roster)?;
        self.route_from_client(items).await;
        Ok(())
    }

    async fn local_edit(&mut self, edit: TextEditActivity) -> Result<()> {
        if self.stop.is_locked() {
            return Err(SessionError::Locked);
        }
        if !self.roster.can_edit(self.local()) {
            return Err(SessionError::NotAuthorized(self.local().clone()));
        }
        if !self.client.is_open(&edit.document_path) {
            return Err(TransformationError::DocumentNotOpen(edit.document_path).into());
        }

        // rejects edits that do not fit before anything is stamped
        self.buffers
            .apply_operation(&edit.document_path, &edit.to_operation())?;

        let items = self
            .client
            .transform_outgoing(Activity::TextEdit(edit), &self.roster)?;
        self.route_from_client(items).await;
        Ok(())
    }

    async fn broadcast_checksums(&mut self) -> Result<usize> {
        if !self.roster.is_host() {
            return Err(SessionError::ChecksumNotAuthorized(self.local().clone()));
        }

        let checksums: Vec<ChecksumActivity> = self
            .buffers
            .paths()
            .filter(|path| self.client.is_open(path))
            .filter_map(|path| {
                self.buffers
                    .content(path)
                    .map(|content| ChecksumActivity::of(self.local().clone(), path.clone(), content))
            })
            .collect();

        let count = checksums.len();
        for checksum in checksums {
            let items = self
                .client
                .transform_outgoing(Activity::Checksum(checksum), &self.roster)?;
            self.route_from_client(items).await;
        }
        debug!(documents = count, "broadcast checksums");
        Ok(count)
    }

    async fn request_stop(&mut self, target: ParticipantId, kind: StopKind) -> Result<String> {
        if !self.roster.contains(&target) {
            return Err(SessionError::UnknownParticipant(target));
        }
        let request = self.stop.request(kind, target);
        let request_id = request.request_id.clone();
        let items = self
            .client
            .transform_outgoing(Activity::Stop(request), &self.roster)?;
        self.send_remote(items).await;
        Ok(request_id)
    }

    fn set_role(&mut self, participant: &ParticipantId, role: Role) -> Result<()> {
        self.roster.set_role(participant, role)?;
        self.client.role_changed(participant, &self.roster);
        if let Some(server) = self.server.as_mut() {
            server.role_changed(participant, &self.roster);
        }
        Ok(())
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        self.processed += 1;
        let activity = match envelope.decode() {
            Ok(activity) => activity,
            Err(err) => {
                warn!(from = %envelope.from, error = %err, "dropping undecodable activity");
                return;
            }
        };

        if let Some(server) = self.server.as_mut() {
            let for_server = match &activity {
                Activity::Jupiter(_) => true,
                Activity::Checksum(checksum) => checksum.timestamp.is_some(),
                _ => false,
            };
            if for_server || matches!(activity, Activity::File(_)) {
                match server.transform_incoming(&activity, &self.roster, &self.buffers) {
                    Ok(items) => self.route_from_server(items).await,
                    Err(err) => self.server_failed(&activity, err),
                }
            }
            if for_server {
                return;
            }
        }

        let result = self.client.transform_incoming([activity], &self.roster);
        self.apply_result(result).await;
    }

    fn server_failed(&mut self, activity: &Activity, err: SessionError) {
        warn!(activity = %activity, error = %err, "host failed to transform activity");
        if let Some(path) = activity.document_path() {
            self.watchdog.flag(path.clone());
            self.emit(SessionEvent::Inconsistent {
                path: path.clone(),
                reason: err.to_string(),
            });
        }
    }

    /// Deliver what the local client produced. On the host, items addressed
    /// to the host itself are for its server.
    async fn route_from_client(&mut self, items: Vec<QueueItem>) {
        for item in items {
            let (local, remote) = self.split_local(item);
            self.send_remote(remote.into_iter().collect()).await;

            let Some(activity) = local else { continue };
            let Some(server) = self.server.as_mut() else {
                warn!(activity = %activity, "dropping activity addressed to self");
                continue;
            };
            match server.transform_incoming(&activity, &self.roster, &self.buffers) {
                Ok(items) => self.route_from_server(items).await,
                Err(err) => self.server_failed(&activity, err),
            }
        }
    }

    /// Deliver what the server produced. Items addressed to the host go to
    /// its own client.
    async fn route_from_server(&mut self, items: Vec<QueueItem>) {
        for item in items {
            let (local, remote) = self.split_local(item);
            self.send_remote(remote.into_iter().collect()).await;

            if let Some(activity) = local {
                let result = self.client.transform_incoming([activity], &self.roster);
                self.apply_result(result).await;
            }
        }
    }

    fn split_local(&self, item: QueueItem) -> (Option<Activity>, Option<QueueItem>) {
        let local = self.local();
        let to_self = item.recipients.iter().any(|r| r == local);
        let remote: Vec<ParticipantId> = item
            .recipients
            .iter()
            .filter(|r| *r != local)
            .cloned()
            .collect();

        match (to_self, remote.is_empty()) {
            (true, true) => (Some(item.activity), None),
            (true, false) => (
                Some(item.activity.clone()),
                Some(QueueItem::new(remote, item.activity)),
            ),
            (false, _) => (None, Some(QueueItem::new(remote, item.activity))),
        }
    }

    async fn send_remote(&self, items: Vec<QueueItem>) {
        for item in items {
            if item.recipients.is_empty() {
                continue;
            }
            if let Err(err) = self.transport.send(&item.recipients, &item.activity).await {
                warn!(activity = %item.activity, error = %err, "failed to send activity");
            }
        }
    }

    async fn apply_result(&mut self, result: TransformationResult) {
        for request in result.recovery {
            self.watchdog.flag(request.path.clone());
            self.emit(SessionEvent::Inconsistent {
                path: request.path,
                reason: request.reason,
            });
        }

        let mut replies = Vec::new();
        for activity in result.execute_locally {
            if let Some(reply) = self.execute(activity) {
                replies.push(reply);
            }
        }

        self.send_remote(result.send).await;
        for reply in replies {
            match self.client.transform_outgoing(reply, &self.roster) {
                Ok(items) => self.send_remote(items).await,
                Err(err) => warn!(error = %err, "failed to route reply"),
            }
        }
    }

    /// Apply one activity to local state. Returns an activity to send in
    /// response, if any.
    fn execute(&mut self, activity: Activity) -> Option<Activity> {
        match activity {
            Activity::TextEdit(edit) => {
                let path = edit.document_path.clone();
                match self.buffers.apply_operation(&path, &edit.to_operation()) {
                    Ok(()) => self.emit(SessionEvent::RemoteEdit {
                        path,
                        source: edit.source,
                    }),
                    Err(err) => {
                        warn!(edit = %edit, error = %err, "failed to apply remote edit");
                        self.watchdog.flag(path.clone());
                        self.emit(SessionEvent::Inconsistent {
                            path,
                            reason: err.to_string(),
                        });
                    }
                }
                None
            }
            Activity::Checksum(checksum) => {
                let content = self.buffers.content(&checksum.document_path);
                if let Err(err) = self.watchdog.check(&checksum, content) {
                    self.emit(SessionEvent::Inconsistent {
                        path: checksum.document_path,
                        reason: err.to_string(),
                    });
                }
                None
            }
            Activity::File(file) => {
                match file.change {
                    FileChange::Created => {
                        if self.buffers.create(file.document_path.clone(), "").is_ok() {
                            self.emit(SessionEvent::DocumentOpened {
                                path: file.document_path,
                            });
                        }
                    }
                    FileChange::Removed => {
                        if self.buffers.remove(&file.document_path).is_some() {
                            self.watchdog.clear(&file.document_path);
                            self.emit(SessionEvent::DocumentClosed {
                                path: file.document_path,
                            });
                        }
                    }
                }
                None
            }
            Activity::Stop(stop) => match self.stop.handle(&stop) {
                Ok(StopOutcome::Applied(ack)) => {
                    let by = ack.initiator.clone();
                    self.emit(match ack.kind {
                        StopKind::Lock => SessionEvent::Locked { by },
                        StopKind::Unlock => SessionEvent::Unlocked { by },
                    });
                    Some(Activity::Stop(ack))
                }
                Ok(StopOutcome::Acknowledged(ack)) => {
                    self.emit(SessionEvent::StopAcknowledged {
                        request_id: ack.request_id,
                        kind: ack.kind,
                    });
                    None
                }
                Ok(StopOutcome::Ignored) => None,
                Err(err) => {
                    warn!(stop = %stop, error = %err, "dropping stop activity");
                    None
                }
            },
            Activity::Jupiter(jupiter) => {
                warn!(activity = %jupiter, "untransformed operation reached local execution");
                None
            }
        }
    }
}

/// Handle to a running [`SessionActor`].
#[derive(Clone)]
pub struct SessionHandle {
    participant: ParticipantId,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn request<R>(&self, command: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SessionError::ActorClosed)?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    /// Start tracking a document whose content every participant already has.
    pub async fn open_document(
        &self,
        path: impl Into<DocumentPath>,
        content: impl Into<String>,
    ) -> Result<()> {
        let path = path.into();
        let content = content.into();
        self.request(|reply| Command::OpenDocument {
            path,
            content,
            reply,
        })
        .await?
    }

    /// Stop tracking a document here only.
    pub async fn close_document(&self, path: impl Into<DocumentPath>) -> Result<()> {
        let path = path.into();
        self.request(|reply| Command::CloseDocument { path, reply })
            .await?
    }

    /// Create an empty document for everyone.
    pub async fn create_document(&self, path: impl Into<DocumentPath>) -> Result<()> {
        let path = path.into();
        self.request(|reply| Command::CreateDocument { path, reply })
            .await?
    }

    /// Remove a document for everyone.
    pub async fn remove_document(&self, path: impl Into<DocumentPath>) -> Result<()> {
        let path = path.into();
        self.request(|reply| Command::RemoveDocument { path, reply })
            .await?
    }

    /// Replace `replaced` at `offset` by `text`.
    pub async fn edit(
        &self,
        path: impl Into<DocumentPath>,
        offset: usize,
        text: impl Into<String>,
        replaced: impl Into<String>,
    ) -> Result<()> {
        let path = path.into();
        let text = text.into();
        let replaced = replaced.into();
        self.request(|reply| Command::Edit {
            path,
            offset,
            text,
            replaced,
            reply,
        })
        .await?
    }

    pub async fn insert(
        &self,
        path: impl Into<DocumentPath>,
        offset: usize,
        text: impl Into<String>,
    ) -> Result<()> {
        self.edit(path, offset, text, "").await
    }

    pub async fn delete(
        &self,
        path: impl Into<DocumentPath>,
        offset: usize,
        replaced: impl Into<String>,
    ) -> Result<()> {
        self.edit(path, offset, "", replaced).await
    }

    /// Send a checksum of every open document. Host only.
    pub async fn broadcast_checksums(&self) -> Result<usize> {
        self.request(|reply| Command::BroadcastChecksums { reply })
            .await?
    }

    /// Ask `target` to stop editing. Returns the request id.
    pub async fn lock(&self, target: impl Into<ParticipantId>) -> Result<String> {
        let target = target.into();
        self.request(|reply| Command::Stop {
            target,
            kind: StopKind::Lock,
            reply,
        })
        .await?
    }

    pub async fn unlock(&self, target: impl Into<ParticipantId>) -> Result<String> {
        let target = target.into();
        self.request(|reply| Command::Stop {
            target,
            kind: StopKind::Unlock,
            reply,
        })
        .await?
    }

    pub async fn is_locked(&self) -> Result<bool> {
        self.request(|reply| Command::IsLocked { reply }).await
    }

    pub async fn content(&self, path: impl Into<DocumentPath>) -> Result<Option<String>> {
        let path = path.into();
        self.request(|reply| Command::Content { path, reply }).await
    }

    pub async fn inconsistent_paths(&self) -> Result<Vec<DocumentPath>> {
        self.request(|reply| Command::InconsistentPaths { reply })
            .await
    }

    pub async fn join(&self, participant: impl Into<ParticipantId>, role: Role) -> Result<()> {
        let participant = participant.into();
        self.request(|reply| Command::Join {
            participant,
            role,
            reply,
        })
        .await?
    }

    pub async fn leave(&self, participant: impl Into<ParticipantId>) -> Result<()> {
        let participant = participant.into();
        self.request(|reply| Command::Leave { participant, reply })
            .await?
    }

    pub async fn set_role(&self, participant: impl Into<ParticipantId>, role: Role) -> Result<()> {
        let participant = participant.into();
        self.request(|reply| Command::SetRole {
            participant,
            role,
            reply,
        })
        .await?
    }

    /// Wait until the actor has handled everything already in its inbox.
    ///
    /// Returns the number of incoming activities processed so far.
    pub async fn flush(&self) -> Result<u64> {
        self.request(|reply| Command::Flush { reply }).await
    }

    pub async fn shutdown(self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

/// Wait until no session has activities left to process.
///
/// Callers must not issue other commands meanwhile.
pub async fn settle(handles: &[SessionHandle]) -> Result<()> {
    let mut previous: Option<Vec<u64>> = None;
    loop {
        let mut counts = Vec::with_capacity(handles.len());
        for handle in handles {
            counts.push(handle.flush().await?);
        }
        if previous.as_ref() == Some(&counts) {
            return Ok(());
        }
        previous = Some(counts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::create_network;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    fn spawn_pair() -> (SessionHandle, SessionHandle) {
        let network = create_network(["host", "alice"]);
        let host = SessionActor::spawn(
            SessionConfig::default(),
            Roster::new(id("host"), id("host")).with("alice", Role::Editor),
            network[0].clone(),
        )
        .unwrap();
        let alice = SessionActor::spawn(
            SessionConfig::default(),
            Roster::new(id("alice"), id("host")).with("alice", Role::Editor),
            network[1].clone(),
        )
        .unwrap();
        (host, alice)
    }

    #[tokio::test]
    async fn test_edit_reaches_other_side() {
        let (host, alice) = spawn_pair();
        host.open_document("a.txt", "abc").await.unwrap();
        alice.open_document("a.txt", "abc").await.unwrap();

        alice.insert("a.txt", 3, "d").await.unwrap();
        settle(&[host.clone(), alice.clone()]).await.unwrap();

        assert_eq!(host.content("a.txt").await.unwrap().as_deref(), Some("abcd"));
    }

    #[tokio::test]
    async fn test_invalid_edit_is_rejected_locally() {
        let (host, alice) = spawn_pair();
        host.open_document("a.txt", "abc").await.unwrap();
        alice.open_document("a.txt", "abc").await.unwrap();

        assert!(matches!(
            alice.delete("a.txt", 0, "xyz").await,
            Err(SessionError::Apply(_))
        ));
        assert!(matches!(
            alice.insert("b.txt", 0, "x").await,
            Err(SessionError::Transformation(TransformationError::DocumentNotOpen(_)))
        ));
        settle(&[host.clone(), alice.clone()]).await.unwrap();
        assert_eq!(host.content("a.txt").await.unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_transport_must_match_participant() {
        let network = create_network(["host", "alice"]);
        let result = SessionActor::spawn(
            SessionConfig::default(),
            Roster::new(id("alice"), id("host")),
            network[0].clone(),
        );
        assert!(matches!(result, Err(SessionError::Transport(_))));
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let (host, _alice) = spawn_pair();
        let other = host.clone();
        host.shutdown().await.unwrap();
        assert_eq!(other.flush().await, Err(SessionError::ActorClosed));
    }

    #[tokio::test]
    async fn test_zero_sized_config_is_usable() {
        let config = SessionConfig {
            command_capacity: 0,
            event_capacity: 0,
            checksum_interval_ms: 0,
            auto_checksum: false,
        };
        let network = create_network(["host"]);
        let host = SessionActor::spawn(config, Roster::new(id("host"), id("host")), network[0].clone()).unwrap();

        host.open_document("a.txt", "abc").await.unwrap();
        host.insert("a.txt", 3, "d").await.unwrap();
        assert_eq!(host.flush().await, Ok(0));
        assert_eq!(host.content("a.txt").await.unwrap().as_deref(), Some("abcd"));
    }
}
