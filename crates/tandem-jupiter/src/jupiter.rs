//! The pairwise Jupiter state machine.
//!
//! One [`Jupiter`] instance sits at each end of a channel between a
//! participant and the host. Both ends run the same code; the tie-break
//! between concurrent inserts is derived from the operations' origins, so
//! the two ends always pick the same winner.

use crate::error::{Result, TransformationError};
use std::collections::VecDeque;
use tandem_ot::{Operation, ParticipantId, Tie, Timestamp};
use tracing::trace;

/// Whether the channel has unacknowledged local operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Pending,
}

/// A locally generated operation the other side has not acknowledged yet.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Outstanding {
    /// Rebased onto every remote operation received since generation.
    op: Operation,
    origin: ParticipantId,
    /// Value of the local component when the operation was generated.
    local_count: u32,
}

/// One end of a Jupiter channel.
#[derive(Clone, Debug, Default)]
pub struct Jupiter {
    timestamp: Timestamp,
    outstanding: VecDeque<Outstanding>,
}

impl Jupiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current (local, remote) counts.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn state(&self) -> ChannelState {
        if self.outstanding.is_empty() {
            ChannelState::Idle
        } else {
            ChannelState::Pending
        }
    }

    /// Number of operations awaiting acknowledgment.
    pub fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }

    /// Record a local operation and return the timestamp to send it with.
    pub fn generate(&mut self, op: Operation, origin: ParticipantId) -> Timestamp {
        let stamp = self.timestamp;
        self.outstanding.push_back(Outstanding {
            op,
            origin,
            local_count: stamp.local,
        });
        self.timestamp = stamp.increment_local();
        trace!(timestamp = %stamp, outstanding = self.outstanding.len(), "generated");
        stamp
    }

    /// Receive an operation from the other side.
    ///
    /// Returns the operation transformed against every outstanding local
    /// operation, ready to apply. On error the channel state is unchanged.
    pub fn receive(
        &mut self,
        timestamp: Timestamp,
        op: Operation,
        origin: &ParticipantId,
    ) -> Result<Operation> {
        self.check_preconditions(timestamp)?;
        self.discard_acknowledged(timestamp)?;

        let mut incoming = op;
        for entry in self.outstanding.iter_mut() {
            let tie = Tie::between(origin, &entry.origin);
            let transformed = incoming.transform(&entry.op, tie);
            entry.op = entry.op.transform(&incoming, tie.flip());
            incoming = transformed;
        }

        self.timestamp = self.timestamp.increment_remote();
        trace!(timestamp = %self.timestamp, op = %incoming, "received");
        Ok(incoming)
    }

    /// True if `timestamp`, stamped by the other side, describes exactly
    /// the state this side is in.
    ///
    /// A checksum carrying a stale timestamp was computed before some
    /// operations were accounted for and cannot be compared.
    pub fn is_current(&mut self, timestamp: Timestamp) -> Result<bool> {
        self.discard_acknowledged(timestamp)?;
        Ok(timestamp.mirrored() == self.timestamp)
    }

    /// Forget all outstanding operations and start counting from zero.
    pub fn reset(&mut self) {
        self.timestamp = Timestamp::default();
        self.outstanding.clear();
    }

    fn check_preconditions(&self, timestamp: Timestamp) -> Result<()> {
        if let Some(oldest) = self.outstanding.front() {
            if timestamp.remote < oldest.local_count {
                return Err(TransformationError::AcknowledgedTooOld {
                    acknowledged: timestamp.remote,
                    oldest: oldest.local_count,
                });
            }
        }
        if timestamp.local != self.timestamp.remote {
            return Err(TransformationError::TimestampMismatch {
                expected: self.timestamp.remote,
                found: timestamp.local,
            });
        }
        Ok(())
    }

    fn discard_acknowledged(&mut self, timestamp: Timestamp) -> Result<()> {
        if timestamp.remote > self.timestamp.local {
            return Err(TransformationError::AcknowledgedUnknown {
                acknowledged: timestamp.remote,
                generated: self.timestamp.local,
            });
        }
        while self
            .outstanding
            .front()
            .is_some_and(|entry| entry.local_count < timestamp.remote)
        {
            self.outstanding.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    #[test]
    fn test_generate_stamps_and_queues() {
        let mut jupiter = Jupiter::new();
        assert_eq!(jupiter.state(), ChannelState::Idle);

        let first = jupiter.generate(Operation::insert(0, "a"), id("alice"));
        let second = jupiter.generate(Operation::insert(1, "b"), id("alice"));

        assert_eq!(first, Timestamp::new(0, 0));
        assert_eq!(second, Timestamp::new(1, 0));
        assert_eq!(jupiter.timestamp(), Timestamp::new(2, 0));
        assert_eq!(jupiter.state(), ChannelState::Pending);
        assert_eq!(jupiter.outstanding_len(), 2);
    }

    #[test]
    fn test_receive_transforms_against_outstanding() {
        let mut client = Jupiter::new();
        client.generate(Operation::insert(0, "foo"), id("bob"));

        // host had not seen bob's insert yet
        let op = client
            .receive(Timestamp::new(0, 0), Operation::insert(0, "bar"), &id("alice"))
            .unwrap();

        // alice sorts before bob, so her insert stays in front
        assert_eq!(op, Operation::insert(0, "bar"));
        assert_eq!(client.timestamp(), Timestamp::new(1, 1));
        assert_eq!(client.state(), ChannelState::Pending);
    }

    #[test]
    fn test_acknowledgment_discards_outstanding() {
        let mut client = Jupiter::new();
        client.generate(Operation::insert(0, "foo"), id("bob"));

        // host saw bob's insert before generating this one
        let op = client
            .receive(Timestamp::new(0, 1), Operation::insert(3, "!"), &id("alice"))
            .unwrap();

        assert_eq!(op, Operation::insert(3, "!"));
        assert_eq!(client.state(), ChannelState::Idle);
    }

    #[test]
    fn test_duplicate_delivery_is_rejected() {
        let mut client = Jupiter::new();
        let op = Operation::insert(0, "x");
        client
            .receive(Timestamp::new(0, 0), op.clone(), &id("alice"))
            .unwrap();

        let err = client
            .receive(Timestamp::new(0, 0), op, &id("alice"))
            .unwrap_err();
        assert_eq!(
            err,
            TransformationError::TimestampMismatch { expected: 1, found: 0 }
        );
        assert_eq!(client.timestamp(), Timestamp::new(0, 1));
    }

    #[test]
    fn test_acknowledging_unsent_operations_fails() {
        let mut client = Jupiter::new();
        let err = client
            .receive(Timestamp::new(0, 2), Operation::insert(0, "x"), &id("alice"))
            .unwrap_err();
        assert!(matches!(err, TransformationError::AcknowledgedUnknown { .. }));
    }

    #[test]
    fn test_ack_going_backwards_fails() {
        let mut client = Jupiter::new();
        client.generate(Operation::insert(0, "a"), id("bob"));
        client.generate(Operation::insert(1, "b"), id("bob"));
        client
            .receive(Timestamp::new(0, 1), Operation::NoOperation, &id("alice"))
            .unwrap();

        let err = client
            .receive(Timestamp::new(1, 0), Operation::NoOperation, &id("alice"))
            .unwrap_err();
        assert_eq!(
            err,
            TransformationError::AcknowledgedTooOld { acknowledged: 0, oldest: 1 }
        );
    }

    #[test]
    fn test_is_current() {
        let mut client = Jupiter::new();
        client
            .receive(Timestamp::new(0, 0), Operation::insert(0, "x"), &id("alice"))
            .unwrap();

        // host stamped after sending one op and seeing none of ours
        assert!(client.is_current(Timestamp::new(1, 0)).unwrap());

        client.generate(Operation::insert(1, "y"), id("bob"));
        assert!(!client.is_current(Timestamp::new(1, 0)).unwrap());
        assert!(client.is_current(Timestamp::new(1, 1)).unwrap());
        assert_eq!(client.state(), ChannelState::Idle);
    }

    #[test]
    fn test_reset() {
        let mut client = Jupiter::new();
        client.generate(Operation::insert(0, "a"), id("bob"));
        client.reset();

        assert_eq!(client.timestamp(), Timestamp::default());
        assert_eq!(client.state(), ChannelState::Idle);
    }
}
