//! Delivery of activities between participants.
//!
//! The session layer only needs ordered delivery per pair of participants.
//! [`MemoryTransport`] provides that in-process, passing every activity
//! through the wire codec on the way.

use crate::activity::{self, Activity};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tandem_ot::ParticipantId;
use thiserror::Error;
use tokio::sync::mpsc;

/// An encoded activity as received from a peer.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub from: ParticipantId,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn decode(&self) -> Result<Activity, crate::error::ActivityError> {
        activity::decode(&self.payload)
    }
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    #[error("Peer not found: {0}")]
    PeerNotFound(ParticipantId),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),
}

/// Abstract activity transport.
#[async_trait]
pub trait ActivityTransport: Send + Sync + 'static {
    fn local_id(&self) -> &ParticipantId;

    /// Send an activity to each recipient, in order per recipient.
    ///
    /// Every recipient is attempted; the first failure is returned.
    async fn send(
        &self,
        recipients: &[ParticipantId],
        activity: &Activity,
    ) -> Result<(), TransportError>;

    /// Take the receiver of incoming envelopes. Only the first call gets it.
    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<Envelope>>;

    fn connected_peers(&self) -> Vec<ParticipantId>;
}

type SharedReceiver = Arc<RwLock<Option<mpsc::UnboundedReceiver<Envelope>>>>;
type SharedOutgoing = Arc<RwLock<HashMap<ParticipantId, mpsc::UnboundedSender<Envelope>>>>;

/// In-memory transport for testing and simulation.
///
/// Channels are unbounded: two session actors sending to each other must
/// never wait on each other's queue.
pub struct MemoryTransport {
    local_id: ParticipantId,
    inbox_tx: mpsc::UnboundedSender<Envelope>,
    inbox_rx: SharedReceiver,
    outgoing: SharedOutgoing,
}

impl MemoryTransport {
    pub fn new(local_id: ParticipantId) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            local_id,
            inbox_tx: tx,
            inbox_rx: Arc::new(RwLock::new(Some(rx))),
            outgoing: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Connect two memory transports in both directions.
    pub fn connect_to(&self, other: &MemoryTransport) {
        self.outgoing
            .write()
            .insert(other.local_id.clone(), other.inbox_tx.clone());
        other
            .outgoing
            .write()
            .insert(self.local_id.clone(), self.inbox_tx.clone());
    }

    pub fn disconnect(&self, peer: &ParticipantId) -> bool {
        self.outgoing.write().remove(peer).is_some()
    }
}

#[async_trait]
impl ActivityTransport for MemoryTransport {
    fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    async fn send(
        &self,
        recipients: &[ParticipantId],
        activity: &Activity,
    ) -> Result<(), TransportError> {
        let payload =
            activity::encode(activity).map_err(|e| TransportError::Encoding(e.to_string()))?;

        let mut first_error = None;
        for recipient in recipients {
            let tx = {
                let outgoing = self.outgoing.read();
                outgoing.get(recipient).cloned()
            };

            let result = match tx {
                Some(tx) => tx
                    .send(Envelope {
                        from: self.local_id.clone(),
                        payload: payload.clone(),
                    })
                    .map_err(|e| TransportError::SendFailed(e.to_string())),
                None => Err(TransportError::PeerNotFound(recipient.clone())),
            };

            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        self.inbox_rx.write().take()
    }

    fn connected_peers(&self) -> Vec<ParticipantId> {
        let mut peers: Vec<_> = self.outgoing.read().keys().cloned().collect();
        peers.sort();
        peers
    }
}

/// Create fully connected memory transports, one per participant.
pub fn create_network<I, P>(participants: I) -> Vec<Arc<MemoryTransport>>
where
    I: IntoIterator<Item = P>,
    P: Into<ParticipantId>,
{
    let transports: Vec<_> = participants
        .into_iter()
        .map(|p| MemoryTransport::new(p.into()))
        .collect();

    for i in 0..transports.len() {
        for j in (i + 1)..transports.len() {
            transports[i].connect_to(&transports[j]);
        }
    }

    transports.into_iter().map(Arc::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::FileActivity;
    use tandem_ot::DocumentPath;

    fn removal(source: &str) -> Activity {
        Activity::File(FileActivity::removed(
            ParticipantId::new(source),
            DocumentPath::new("a.txt"),
        ))
    }

    #[tokio::test]
    async fn test_network_creation() {
        let network = create_network(["host", "alice", "bob"]);
        assert_eq!(network.len(), 3);

        for transport in &network {
            assert_eq!(transport.connected_peers().len(), 2);
        }
    }

    #[tokio::test]
    async fn test_delivery_is_ordered_and_decodable() {
        let network = create_network(["host", "alice"]);
        let mut inbox = network[1].subscribe().unwrap();
        assert!(network[1].subscribe().is_none());

        let alice = [ParticipantId::new("alice")];
        network[0].send(&alice, &removal("first")).await.unwrap();
        network[0].send(&alice, &removal("second")).await.unwrap();

        let first = inbox.recv().await.unwrap();
        assert_eq!(first.from, ParticipantId::new("host"));
        assert_eq!(first.decode().unwrap(), removal("first"));
        assert_eq!(inbox.recv().await.unwrap().decode().unwrap(), removal("second"));
    }

    #[tokio::test]
    async fn test_unknown_peer_does_not_stop_delivery() {
        let network = create_network(["host", "alice"]);
        let mut inbox = network[1].subscribe().unwrap();

        let recipients = [ParticipantId::new("ghost"), ParticipantId::new("alice")];
        let err = network[0].send(&recipients, &removal("host")).await.unwrap_err();
        assert_eq!(err, TransportError::PeerNotFound(ParticipantId::new("ghost")));
        assert!(inbox.recv().await.is_some());
    }
}
