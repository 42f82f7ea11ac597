//! Protocol invariant checks.
//!
//! Verified after every simulated event:
//! - Safety: exactly one holder, and it matches the cached holder id
//! - Queues: no duplicates, every entry is the node itself or a neighbor
//! - Self-requests: a node's own id is queued iff it has an unserved request
//! - Polarity: the walk from every node reaches the holder without cycles

use raymond_mutex::{MutexCoordinator, Snapshot};
use raymond_types::{NodeId, TreeTopology};
use std::collections::BTreeSet;
use thiserror::Error;

/// A broken protocol invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("expected exactly one holder, found {0}")]
    HolderCount(usize),

    #[error("cached holder {cached} disagrees with flagged holder {flagged}")]
    HolderMismatch { cached: NodeId, flagged: NodeId },

    #[error("{entry} queued twice at {node}")]
    DuplicateEntry { node: NodeId, entry: NodeId },

    #[error("{entry} queued at {node} but is not a neighbor")]
    NonNeighborEntry { node: NodeId, entry: NodeId },

    #[error("{node}: self-request queued = {queued}, outstanding = {pending}")]
    SelfRequestMismatch {
        node: NodeId,
        queued: bool,
        pending: bool,
    },

    #[error("polarity walk from {0} revisits a node")]
    PolarityCycle(NodeId),

    #[error("polarity walk from {start} leaves the tree at {at}")]
    DeadEnd { start: NodeId, at: NodeId },

    #[error("release cascaded {hops} hops with only {outstanding} queued entries")]
    CascadeBound { hops: usize, outstanding: usize },

    #[error("requests never served: {0:?}")]
    Stranded(Vec<NodeId>),
}

/// Check every structural invariant of `tree`.
///
/// `pending` is the set of nodes whose requests the driver issued and has not
/// yet seen satisfied.
pub fn check_invariants(
    tree: &MutexCoordinator,
    pending: &BTreeSet<NodeId>,
) -> Result<(), InvariantViolation> {
    check_snapshot(tree.topology(), &tree.snapshot(), pending)
}

/// Check a captured state against the tree it was taken from.
pub fn check_snapshot(
    topology: &TreeTopology,
    snapshot: &Snapshot,
    pending: &BTreeSet<NodeId>,
) -> Result<(), InvariantViolation> {
    let flagged: Vec<NodeId> = snapshot
        .nodes
        .iter()
        .filter(|n| n.is_holder)
        .map(|n| n.id)
        .collect();
    match flagged.as_slice() {
        [only] if *only == snapshot.holder => {}
        [only] => {
            return Err(InvariantViolation::HolderMismatch {
                cached: snapshot.holder,
                flagged: *only,
            })
        }
        _ => return Err(InvariantViolation::HolderCount(flagged.len())),
    }

    for node in &snapshot.nodes {
        let id = node.id;

        let mut seen = BTreeSet::new();
        for &entry in &node.queue {
            if !seen.insert(entry) {
                return Err(InvariantViolation::DuplicateEntry { node: id, entry });
            }
            if entry != id && topology.polarity_toward(id, entry).is_none() {
                return Err(InvariantViolation::NonNeighborEntry { node: id, entry });
            }
        }

        let queued = node.queue.contains(&id);
        let outstanding = pending.contains(&id);
        if queued != outstanding {
            return Err(InvariantViolation::SelfRequestMismatch {
                node: id,
                queued,
                pending: outstanding,
            });
        }

        check_polarity_walk(topology, snapshot, id)?;
    }

    Ok(())
}

/// A release may hand the token on at most once per queued entry.
pub fn check_cascade(hops: usize, outstanding: usize) -> Result<(), InvariantViolation> {
    if hops > outstanding {
        return Err(InvariantViolation::CascadeBound { hops, outstanding });
    }
    Ok(())
}

fn check_polarity_walk(
    topology: &TreeTopology,
    snapshot: &Snapshot,
    start: NodeId,
) -> Result<(), InvariantViolation> {
    let mut visited = BTreeSet::from([start]);
    let mut current = start;
    // A walk longer than the tree must repeat a node.
    for _ in 0..topology.len() {
        let Some(node) = snapshot.node(current) else {
            return Err(InvariantViolation::DeadEnd { start, at: current });
        };
        if node.is_holder {
            return Ok(());
        }
        let Some(next) = topology.neighbor(current, node.polarity) else {
            return Err(InvariantViolation::DeadEnd { start, at: current });
        };
        if !visited.insert(next) {
            return Err(InvariantViolation::PolarityCycle(start));
        }
        current = next;
    }
    Err(InvariantViolation::PolarityCycle(start))
}
