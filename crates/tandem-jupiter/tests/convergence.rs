//! Convergence tests for the Jupiter star topology
//!
//! These tests verify that every participant ends up with the host's
//! content under arbitrary interleavings of deliveries across channels,
//! while each channel stays FIFO.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tandem_jupiter::simulation::StarCluster;
use tandem_jupiter::TransformationError;
use tandem_jupiter::{JupiterActivity, JupiterClient};
use tandem_ot::{DocumentPath, Operation, ParticipantId, Timestamp};

/// Produce an edit that is valid on `content`
fn random_edit(rng: &mut StdRng, content: &str) -> Operation {
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() || rng.gen_bool(0.6) {
        let pos = rng.gen_range(0..=chars.len());
        let len = rng.gen_range(1..=3);
        let text: String = (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
        Operation::insert(pos, text)
    } else {
        let pos = rng.gen_range(0..chars.len());
        let end = (pos + rng.gen_range(1..=4)).min(chars.len());
        Operation::delete(pos, chars[pos..end].iter().collect::<String>())
    }
}

fn run_random_session(seed: u64, participants: &[&str], steps: usize) -> StarCluster {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cluster = StarCluster::new(participants, "the quick brown fox");

    for _ in 0..steps {
        let idx = rng.gen_range(0..cluster.len());
        match rng.gen_range(0..3) {
            0 => {
                let op = random_edit(&mut rng, cluster.content(idx));
                cluster.edit(idx, op).unwrap();
            }
            1 => {
                cluster.deliver_to_host(idx).unwrap();
            }
            _ => {
                cluster.deliver_to_replica(idx).unwrap();
            }
        }
    }

    cluster.flush().unwrap();
    cluster
}

// ============================================================================
// Convergence Tests
// ============================================================================

#[test]
fn test_same_position_inserts_agree() {
    let mut cluster = StarCluster::new(&["alice", "bob"], "");
    cluster.edit(0, Operation::insert(0, "foo")).unwrap();
    cluster.edit(1, Operation::insert(0, "bar")).unwrap();
    cluster.flush().unwrap();

    assert!(cluster.is_converged());
    assert_eq!(cluster.content(0), cluster.content(1));
    // participant order decides: "alice" < "bob"
    assert_eq!(cluster.server_content(), "foobar");
}

#[test]
fn test_tie_break_independent_of_arrival_order() {
    for host_first in [0, 1] {
        let mut cluster = StarCluster::new(&["alice", "bob"], "");
        cluster.edit(0, Operation::insert(0, "foo")).unwrap();
        cluster.edit(1, Operation::insert(0, "bar")).unwrap();
        cluster.deliver_to_host(host_first).unwrap();
        cluster.flush().unwrap();

        assert_eq!(cluster.content(0), "foobar");
        assert_eq!(cluster.content(1), "foobar");
    }
}

#[test]
fn test_delete_against_concurrent_insert_inside_range() {
    let mut cluster = StarCluster::new(&["alice", "bob"], "abcdef");
    cluster.edit(0, Operation::delete(1, "bcde")).unwrap();
    cluster.edit(1, Operation::insert(3, "XY")).unwrap();
    cluster.flush().unwrap();

    assert!(cluster.is_converged());
    assert_eq!(cluster.server_content(), "aXYf");
}

#[test]
fn test_pending_operations_do_not_block_receiving() {
    let mut cluster = StarCluster::new(&["alice", "bob"], "hello");
    cluster.edit(0, Operation::insert(5, " world")).unwrap();
    cluster.edit(0, Operation::insert(0, "> ")).unwrap();
    cluster.edit(1, Operation::delete(0, "h")).unwrap();
    cluster.edit(1, Operation::insert(0, "H")).unwrap();

    // bob's edits are serialized first and reach alice while hers are pending
    cluster.deliver_to_host(1).unwrap();
    cluster.deliver_to_host(1).unwrap();
    cluster.deliver_to_replica(0).unwrap();
    cluster.deliver_to_replica(0).unwrap();
    assert_eq!(cluster.content(0), "> Hello world");
    assert_eq!(cluster.uplink_len(0), 2);

    cluster.flush().unwrap();
    assert!(cluster.is_converged());
    assert_eq!(cluster.server_content(), "> Hello world");
}

#[test]
fn test_random_sessions_converge() {
    for seed in 0..40 {
        let cluster = run_random_session(seed, &["alice", "bob", "carol"], 200);
        assert!(cluster.is_converged(), "seed {} diverged", seed);
    }
}

#[test]
fn test_many_participants_converge() {
    let cluster = run_random_session(
        7,
        &["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"],
        1_000,
    );
    assert!(cluster.is_converged());
    assert_eq!(cluster.in_flight(), 0);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_duplicate_delivery_rejected_not_applied() {
    let path = DocumentPath::new("doc");
    let mut client = JupiterClient::new(ParticipantId::new("bob"));
    client.open(path.clone());

    let activity = JupiterActivity::new(
        Timestamp::new(0, 0),
        Operation::insert(0, "x"),
        path.clone(),
        ParticipantId::new("alice"),
    );
    assert_eq!(client.receive(&activity).unwrap(), Operation::insert(0, "x"));
    assert!(matches!(
        client.receive(&activity),
        Err(TransformationError::TimestampMismatch { .. })
    ));
    assert_eq!(client.timestamp(&path).unwrap(), Timestamp::new(0, 1));
}
