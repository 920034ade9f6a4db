//! In-memory star network for exercising the Jupiter protocol.
//!
//! Every participant has a FIFO uplink to the host and a FIFO downlink from
//! it. Channels preserve order individually; the caller decides how
//! deliveries on different channels interleave.

use crate::activity::JupiterActivity;
use crate::client::JupiterClient;
use crate::error::TransformationError;
use crate::server::JupiterServer;
use std::collections::VecDeque;
use tandem_ot::{DocumentPath, Operation, OperationError, ParticipantId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error(transparent)]
    Transformation(#[from] TransformationError),

    #[error(transparent)]
    Apply(#[from] OperationError),
}

/// A participant's replica of the shared document.
#[derive(Debug)]
pub struct Replica {
    pub client: JupiterClient,
    pub content: String,
    uplink: VecDeque<JupiterActivity>,
    downlink: VecDeque<JupiterActivity>,
}

/// A host plus participants editing one document.
#[derive(Debug)]
pub struct StarCluster {
    path: DocumentPath,
    server: JupiterServer,
    server_content: String,
    replicas: Vec<Replica>,
}

impl StarCluster {
    pub fn new(participants: &[&str], initial: &str) -> Self {
        let path = DocumentPath::new("shared.txt");
        let ids: Vec<ParticipantId> = participants.iter().map(|p| ParticipantId::new(*p)).collect();

        let mut server = JupiterServer::new();
        server.open_document(path.clone(), ids.iter().cloned());

        let replicas = ids
            .into_iter()
            .map(|id| {
                let mut client = JupiterClient::new(id);
                client.open(path.clone());
                Replica {
                    client,
                    content: initial.to_string(),
                    uplink: VecDeque::new(),
                    downlink: VecDeque::new(),
                }
            })
            .collect();

        Self {
            path,
            server,
            server_content: initial.to_string(),
            replicas,
        }
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn replica(&self, idx: usize) -> &Replica {
        &self.replicas[idx]
    }

    pub fn content(&self, idx: usize) -> &str {
        &self.replicas[idx].content
    }

    pub fn server_content(&self) -> &str {
        &self.server_content
    }

    /// Apply a local edit at a replica and queue it for the host.
    pub fn edit(&mut self, idx: usize, op: Operation) -> Result<(), SimulationError> {
        let replica = &mut self.replicas[idx];
        replica.content = op.apply(&replica.content)?;
        let activity = replica.client.generate(&self.path, op)?;
        replica.uplink.push_back(activity);
        Ok(())
    }

    /// Deliver the oldest message from a replica to the host.
    ///
    /// Returns false if the uplink was empty.
    pub fn deliver_to_host(&mut self, idx: usize) -> Result<bool, SimulationError> {
        let Some(activity) = self.replicas[idx].uplink.pop_front() else {
            return Ok(false);
        };
        let content = &self.server_content;
        let result = self
            .server
            .transform_checked(&activity, |op| op.apply(content).map(|_| ()))?;
        self.server_content = result.operation.apply(&self.server_content)?;

        for (recipient, outgoing) in result.outgoing {
            if let Some(replica) = self
                .replicas
                .iter_mut()
                .find(|r| r.client.local() == &recipient)
            {
                replica.downlink.push_back(outgoing);
            }
        }
        Ok(true)
    }

    /// Deliver the oldest message from the host to a replica.
    pub fn deliver_to_replica(&mut self, idx: usize) -> Result<bool, SimulationError> {
        let replica = &mut self.replicas[idx];
        let Some(activity) = replica.downlink.pop_front() else {
            return Ok(false);
        };
        let op = replica.client.receive(&activity)?;
        replica.content = op.apply(&replica.content)?;
        Ok(true)
    }

    /// Messages still in flight in either direction.
    pub fn in_flight(&self) -> usize {
        self.replicas
            .iter()
            .map(|r| r.uplink.len() + r.downlink.len())
            .sum()
    }

    pub fn uplink_len(&self, idx: usize) -> usize {
        self.replicas[idx].uplink.len()
    }

    pub fn downlink_len(&self, idx: usize) -> usize {
        self.replicas[idx].downlink.len()
    }

    /// Deliver everything, uplinks first, until no message is in flight.
    pub fn flush(&mut self) -> Result<(), SimulationError> {
        while self.in_flight() > 0 {
            for idx in 0..self.replicas.len() {
                while self.deliver_to_host(idx)? {}
            }
            for idx in 0..self.replicas.len() {
                while self.deliver_to_replica(idx)? {}
            }
        }
        Ok(())
    }

    /// True when every replica holds the host's content.
    pub fn is_converged(&self) -> bool {
        self.replicas.iter().all(|r| r.content == self.server_content)
    }
}
