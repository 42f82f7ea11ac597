//! Tree-level coordinator: owns the topology and all node state.

use crate::{MutexError, NodeSnapshot, NodeState, Snapshot};
use raymond_core::{Action, Event, RejectReason, StateMachine};
use raymond_types::{NodeId, Polarity, TopologySpec, TreeTopology};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// What a call to [`MutexCoordinator::release`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The holder's queue was empty; nothing changed.
    Retained { holder: NodeId },

    /// The token moved from `from` to `to` across `hops` edges.
    Transferred { from: NodeId, to: NodeId, hops: usize },
}

impl ReleaseOutcome {
    /// The node holding the token after the release.
    pub fn holder(&self) -> NodeId {
        match self {
            ReleaseOutcome::Retained { holder } => *holder,
            ReleaseOutcome::Transferred { to, .. } => *to,
        }
    }
}

/// Raymond's algorithm over a fixed binary tree.
///
/// The coordinator is the only owner of node state. Nodes never touch each
/// other: every forwarded request is delivered here, one hop at a time.
///
/// # Invariants
///
/// - Exactly one node has `holds_token`, and it is `self.holder`
/// - A node's own id is queued iff it has an unsatisfied request
/// - Following polarities from any other node reaches the holder without cycles
#[derive(Debug, Clone)]
pub struct MutexCoordinator {
    /// Immutable structure (single source of truth for parent/child links).
    topology: TreeTopology,

    /// Protocol state per node.
    nodes: BTreeMap<NodeId, NodeState>,

    /// Cached id of the node whose `holds_token` is set.
    holder: NodeId,
}

impl MutexCoordinator {
    /// Build the tree described by `spec`, with the token at its initial holder.
    pub fn new(spec: &TopologySpec) -> Result<Self, MutexError> {
        Ok(Self::from_topology(TreeTopology::build(spec)?))
    }

    /// Start the protocol on an already validated tree.
    pub fn from_topology(topology: TreeTopology) -> Self {
        let holder = topology.initial_holder();
        let nodes = topology
            .initial_polarities()
            .into_iter()
            .map(|(id, polarity)| (id, NodeState::new(id, polarity, id == holder)))
            .collect();

        info!(nodes = topology.len(), holder = %holder, "Tree built");

        Self {
            topology,
            nodes,
            holder,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn topology(&self) -> &TreeTopology {
        &self.topology
    }

    /// Current token holder.
    pub fn holder(&self) -> NodeId {
        self.holder
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeState> {
        self.nodes.get(&id)
    }

    /// All nodes in tree preorder.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeState> + '_ {
        self.topology
            .node_ids()
            .iter()
            .filter_map(|id| self.nodes.get(id))
    }

    pub fn is_holder(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.holds_token())
    }

    pub fn polarity(&self, id: NodeId) -> Option<Polarity> {
        self.nodes.get(&id).map(|n| n.polarity())
    }

    /// Queue contents of `id`, front first.
    pub fn queue(&self, id: NodeId) -> Option<Vec<NodeId>> {
        self.nodes
            .get(&id)
            .map(|n| n.queue().iter().copied().collect())
    }

    /// Total entries across every queue.
    ///
    /// Bounds the number of hops a single release can cascade through.
    pub fn outstanding_requests(&self) -> usize {
        self.nodes.values().map(|n| n.queue().len()).sum()
    }

    /// Follow polarities from `id` until the holder.
    ///
    /// Returns the visited nodes (both ends inclusive), or `None` if the walk
    /// leaves the tree or revisits a node.
    pub fn path_to_holder(&self, id: NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![id];
        let mut current = self.nodes.get(&id)?;
        while !current.holds_token() {
            let next = self.topology.neighbor(current.id(), current.polarity())?;
            if path.contains(&next) {
                return None;
            }
            path.push(next);
            current = self.nodes.get(&next)?;
        }
        Some(path)
    }

    /// Read-only view of every node, in tree preorder.
    pub fn snapshot(&self) -> Snapshot {
        let nodes = self
            .nodes()
            .map(|n| NodeSnapshot {
                id: n.id(),
                is_holder: n.holds_token(),
                polarity: n.polarity(),
                status: n.status(),
                queue: n.queue().iter().copied().collect(),
            })
            .collect();
        Snapshot {
            holder: self.holder,
            nodes,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Operations
    // ═══════════════════════════════════════════════════════════════════════════

    /// `id` asks for the token.
    ///
    /// Queues a self-request and forwards it toward the holder. Asking twice
    /// before being served is a no-op and returns no actions.
    pub fn request(&mut self, id: NodeId) -> Result<Vec<Action>, MutexError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(MutexError::InvalidNodeId(id))?;
        if node.holds_token() {
            return Err(MutexError::AlreadyHolder(id));
        }

        let mut actions = Vec::new();
        match node.send_request() {
            Some(enqueued) => {
                debug!(node = %id, "Added request to own queue");
                actions.push(Action::RequestQueued {
                    node: id,
                    entry: id,
                });
                self.propagate(id, enqueued.forward, &mut actions);
            }
            None => debug!(node = %id, "Request already pending"),
        }
        Ok(actions)
    }

    /// The holder gives up the token.
    ///
    /// The token goes to the front of the holder's queue. If that node only
    /// relayed for others, it immediately passes the token on, and so on until
    /// a node whose own request is at the front of its queue holds it.
    ///
    /// Each hop pops one queue entry, so the cascade is bounded by
    /// [`outstanding_requests`](Self::outstanding_requests) at call time.
    pub fn release(&mut self) -> (ReleaseOutcome, Vec<Action>) {
        let mut actions = Vec::new();
        let origin = self.holder;

        if self
            .nodes
            .get(&origin)
            .is_none_or(|n| n.queue().is_empty())
        {
            info!(holder = %origin, "No outstanding requests, token stays");
            actions.push(Action::TokenRetained { holder: origin });
            return (ReleaseOutcome::Retained { holder: origin }, actions);
        }

        let budget = self.outstanding_requests();
        let mut hops = 0;
        let mut settled = false;

        while hops < budget {
            let Some(to) = self.hand_off(&mut actions) else {
                break;
            };
            hops += 1;

            let Some(node) = self.nodes.get_mut(&to) else {
                break;
            };
            if node.pop_self_request() {
                debug!(node = %to, "Own request satisfied");
                actions.push(Action::RequestSatisfied { node: to });
                settled = true;
                break;
            }
            if node.queue().is_empty() {
                settled = true;
                break;
            }
            debug!(node = %to, front = ?node.front(), "Relaying token onward");
        }

        if !settled {
            error!(
                holder = %self.holder,
                hops,
                budget,
                "Release cascade stopped before reaching a requester"
            );
        }

        let outcome = if hops == 0 {
            actions.push(Action::TokenRetained { holder: origin });
            ReleaseOutcome::Retained { holder: origin }
        } else {
            ReleaseOutcome::Transferred {
                from: origin,
                to: self.holder,
                hops,
            }
        };
        (outcome, actions)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Internal
    // ═══════════════════════════════════════════════════════════════════════════

    /// Move the token one hop, from the holder to the front of its queue.
    ///
    /// Returns the new holder, or `None` if the holder's queue is empty or its
    /// front is not a neighbor (state left untouched in both cases).
    fn hand_off(&mut self, actions: &mut Vec<Action>) -> Option<NodeId> {
        let from = self.holder;
        let to = self.nodes.get(&from)?.front()?;
        let Some(polarity) = self.topology.polarity_toward(from, to) else {
            error!(holder = %from, front = %to, "Queue front is not adjacent to holder");
            return None;
        };

        let remaining = {
            let holder = self.nodes.get_mut(&from)?;
            holder.hand_off(polarity)?;
            !holder.queue().is_empty()
        };
        self.nodes.get_mut(&to)?.take_token();
        self.holder = to;

        info!(from = %from, to = %to, ?polarity, "Token transferred");
        actions.push(Action::TokenTransferred { from, to });

        // Waiters behind `from` now need the token back through `to`.
        if remaining {
            let forward = self.deliver(to, from, actions);
            self.propagate(to, forward, actions);
        }
        Some(to)
    }

    /// Forward requests hop by hop, starting at `from`, until a node absorbs one.
    fn propagate(
        &mut self,
        mut from: NodeId,
        mut forward: Option<Polarity>,
        actions: &mut Vec<Action>,
    ) {
        while let Some(polarity) = forward {
            let Some(to) = self.topology.neighbor(from, polarity) else {
                warn!(
                    node = %from,
                    ?polarity,
                    "No neighbor across polarity edge, request dropped"
                );
                actions.push(Action::ForwardDropped { from });
                return;
            };
            debug!(from = %from, to = %to, "Request forwarded");
            actions.push(Action::RequestForwarded { from, to });
            forward = self.deliver(to, from, actions);
            from = to;
        }
    }

    /// Run `receive_request(sender)` at `to`; returns the edge to forward across.
    fn deliver(
        &mut self,
        to: NodeId,
        sender: NodeId,
        actions: &mut Vec<Action>,
    ) -> Option<Polarity> {
        let node = self.nodes.get_mut(&to)?;
        let enqueued = node.receive_request(sender)?;
        debug!(node = %to, entry = %sender, "Request queued");
        actions.push(Action::RequestQueued {
            node: to,
            entry: sender,
        });
        enqueued.forward
    }
}

impl Default for MutexCoordinator {
    /// The classic 5-node tree with node 1 holding the token.
    fn default() -> Self {
        match TreeTopology::build(&TopologySpec::default_fixture()) {
            Ok(topology) => Self::from_topology(topology),
            Err(e) => unreachable!("default fixture is a valid tree: {e}"),
        }
    }
}

impl StateMachine for MutexCoordinator {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::Request { node } => match self.request(node) {
                Ok(actions) => actions,
                Err(e) => {
                    warn!(error = %e, "Request rejected");
                    let reason = match e {
                        MutexError::AlreadyHolder(_) => RejectReason::AlreadyHolder,
                        _ => RejectReason::InvalidNodeId,
                    };
                    vec![Action::Rejected { event, reason }]
                }
            },
            Event::Release => self.release().1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeStatus;
    use tracing_test::traced_test;

    fn ids(raw: &[u32]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId).collect()
    }

    fn queue(tree: &MutexCoordinator, id: u32) -> Vec<NodeId> {
        tree.queue(NodeId(id)).unwrap()
    }

    #[traced_test]
    #[test]
    fn test_initial_state() {
        let tree = MutexCoordinator::default();

        assert_eq!(tree.holder(), NodeId(1));
        assert!(tree.is_holder(NodeId(1)));
        assert_eq!(tree.outstanding_requests(), 0);
        assert_eq!(tree.snapshot().holder_count(), 1);
        for id in 2..=5 {
            assert_eq!(tree.polarity(NodeId(id)), Some(Polarity::TowardParent));
        }
    }

    #[traced_test]
    #[test]
    fn test_request_forwards_along_path_to_holder() {
        let mut tree = MutexCoordinator::default();

        let actions = tree.request(NodeId(3)).unwrap();
        assert_eq!(
            actions,
            vec![
                Action::RequestQueued {
                    node: NodeId(3),
                    entry: NodeId(3)
                },
                Action::RequestForwarded {
                    from: NodeId(3),
                    to: NodeId(2)
                },
                Action::RequestQueued {
                    node: NodeId(2),
                    entry: NodeId(3)
                },
                Action::RequestForwarded {
                    from: NodeId(2),
                    to: NodeId(1)
                },
                Action::RequestQueued {
                    node: NodeId(1),
                    entry: NodeId(2)
                },
            ]
        );
        assert_eq!(queue(&tree, 3), ids(&[3]));
        assert_eq!(queue(&tree, 2), ids(&[3]));
        assert_eq!(queue(&tree, 1), ids(&[2]));
    }

    #[traced_test]
    #[test]
    fn test_five_node_scenario() {
        let mut tree = MutexCoordinator::default();

        tree.request(NodeId(3)).unwrap();
        tree.request(NodeId(5)).unwrap();
        assert_eq!(queue(&tree, 5), ids(&[5]));
        assert_eq!(queue(&tree, 1), ids(&[2, 5]));

        let (outcome, actions) = tree.release();
        assert_eq!(
            outcome,
            ReleaseOutcome::Transferred {
                from: NodeId(1),
                to: NodeId(3),
                hops: 2
            }
        );
        assert_eq!(
            actions,
            vec![
                Action::TokenTransferred {
                    from: NodeId(1),
                    to: NodeId(2)
                },
                Action::RequestQueued {
                    node: NodeId(2),
                    entry: NodeId(1)
                },
                Action::TokenTransferred {
                    from: NodeId(2),
                    to: NodeId(3)
                },
                Action::RequestQueued {
                    node: NodeId(3),
                    entry: NodeId(2)
                },
                Action::RequestSatisfied { node: NodeId(3) },
            ]
        );

        assert_eq!(tree.holder(), NodeId(3));
        assert_eq!(tree.polarity(NodeId(1)), Some(Polarity::TowardLeft));
        assert_eq!(tree.polarity(NodeId(2)), Some(Polarity::TowardLeft));
        assert_eq!(queue(&tree, 1), ids(&[5]));
        // Relay entries carrying node 5's request back toward node 1
        assert_eq!(queue(&tree, 2), ids(&[1]));
        assert_eq!(queue(&tree, 3), ids(&[2]));
        assert_eq!(queue(&tree, 5), ids(&[5]));

        let snapshot = tree.snapshot();
        assert_eq!(snapshot.holder, NodeId(3));
        assert_eq!(snapshot.holder_count(), 1);
        assert_eq!(
            snapshot.to_string(),
            "1  :Request queue: [5 ]\n\
             2  :Request queue: [1 ]\n\
             3* :Request queue: [2 ]\n\
             4  :Request queue: []\n\
             5  :Request queue: [5 ]\n"
        );

        // The next release walks the token back to node 5
        let (outcome, _) = tree.release();
        assert_eq!(
            outcome,
            ReleaseOutcome::Transferred {
                from: NodeId(3),
                to: NodeId(5),
                hops: 3
            }
        );
        assert_eq!(tree.outstanding_requests(), 0);
        assert_eq!(tree.polarity(NodeId(1)), Some(Polarity::TowardRight));
        assert_eq!(tree.polarity(NodeId(3)), Some(Polarity::TowardParent));
    }

    #[traced_test]
    #[test]
    fn test_request_is_idempotent() {
        let mut tree = MutexCoordinator::default();

        tree.request(NodeId(4)).unwrap();
        let before = tree.snapshot();

        let actions = tree.request(NodeId(4)).unwrap();
        assert!(actions.is_empty());
        assert_eq!(tree.snapshot(), before);
        assert_eq!(queue(&tree, 4), ids(&[4]));
    }

    #[traced_test]
    #[test]
    fn test_second_relayed_request_stops_at_first_shared_hop() {
        let mut tree = MutexCoordinator::default();

        tree.request(NodeId(3)).unwrap();
        let actions = tree.request(NodeId(4)).unwrap();

        // Node 1 already has node 2 queued, so propagation stops there
        assert_eq!(queue(&tree, 2), ids(&[3, 4]));
        assert_eq!(queue(&tree, 1), ids(&[2]));
        assert_eq!(
            actions.last(),
            Some(&Action::RequestForwarded {
                from: NodeId(2),
                to: NodeId(1)
            })
        );
    }

    #[traced_test]
    #[test]
    fn test_rejected_requests() {
        let mut tree = MutexCoordinator::default();

        assert_eq!(
            tree.request(NodeId(1)),
            Err(MutexError::AlreadyHolder(NodeId(1)))
        );
        assert_eq!(
            tree.request(NodeId(6)),
            Err(MutexError::InvalidNodeId(NodeId(6)))
        );
        assert_eq!(tree.outstanding_requests(), 0);
    }

    #[traced_test]
    #[test]
    fn test_release_without_requests_is_noop() {
        let mut tree = MutexCoordinator::default();
        let before = tree.snapshot();

        let (outcome, actions) = tree.release();
        assert_eq!(outcome, ReleaseOutcome::Retained { holder: NodeId(1) });
        assert_eq!(
            actions,
            vec![Action::TokenRetained { holder: NodeId(1) }]
        );
        assert_eq!(tree.snapshot(), before);
    }

    #[traced_test]
    #[test]
    fn test_release_to_non_adjacent_front_keeps_token() {
        let mut tree = MutexCoordinator::default();
        // 4 is two hops from holder 1
        if let Some(node) = tree.nodes.get_mut(&NodeId(1)) {
            node.queue.insert(NodeId(4));
        }

        let (outcome, actions) = tree.release();
        assert_eq!(outcome, ReleaseOutcome::Retained { holder: NodeId(1) });
        assert_eq!(
            actions,
            vec![Action::TokenRetained { holder: NodeId(1) }]
        );
        assert_eq!(tree.holder(), NodeId(1));
        assert_eq!(queue(&tree, 1), ids(&[4]));
        assert!(logs_contain("Queue front is not adjacent to holder"));
    }

    #[traced_test]
    #[test]
    fn test_cascade_down_a_chain() {
        let mut tree = MutexCoordinator::new(&TopologySpec::chain(4)).unwrap();

        tree.request(NodeId(4)).unwrap();
        assert_eq!(tree.outstanding_requests(), 4);

        let (outcome, _) = tree.release();
        assert_eq!(
            outcome,
            ReleaseOutcome::Transferred {
                from: NodeId(1),
                to: NodeId(4),
                hops: 3
            }
        );
        assert_eq!(tree.outstanding_requests(), 0);
        for id in 1..=3 {
            assert_eq!(tree.polarity(NodeId(id)), Some(Polarity::TowardLeft));
        }
    }

    #[traced_test]
    #[test]
    fn test_relay_with_own_request_gets_token_later() {
        let mut tree = MutexCoordinator::default();

        tree.request(NodeId(3)).unwrap();
        // Node 2 already relays for 3: its own request queues behind without forwarding
        let actions = tree.request(NodeId(2)).unwrap();
        assert_eq!(
            actions,
            vec![Action::RequestQueued {
                node: NodeId(2),
                entry: NodeId(2)
            }]
        );
        assert_eq!(tree.node(NodeId(2)).unwrap().status(), NodeStatus::Waiting);

        let (outcome, _) = tree.release();
        assert_eq!(outcome.holder(), NodeId(3));
        assert_eq!(queue(&tree, 2), ids(&[2]));
        assert_eq!(queue(&tree, 3), ids(&[2]));

        let (outcome, _) = tree.release();
        assert_eq!(
            outcome,
            ReleaseOutcome::Transferred {
                from: NodeId(3),
                to: NodeId(2),
                hops: 1
            }
        );
        assert_eq!(tree.outstanding_requests(), 0);
        assert_eq!(tree.node(NodeId(3)).unwrap().status(), NodeStatus::Idle);
    }

    #[traced_test]
    #[test]
    fn test_initial_holder_below_root() {
        let spec = TopologySpec::default().with_initial_holder(NodeId(4));
        let mut tree = MutexCoordinator::new(&spec).unwrap();

        tree.request(NodeId(5)).unwrap();
        assert_eq!(queue(&tree, 1), ids(&[5]));
        assert_eq!(queue(&tree, 2), ids(&[1]));
        assert_eq!(queue(&tree, 4), ids(&[2]));

        let (outcome, _) = tree.release();
        assert_eq!(
            outcome,
            ReleaseOutcome::Transferred {
                from: NodeId(4),
                to: NodeId(5),
                hops: 3
            }
        );
        assert_eq!(tree.outstanding_requests(), 0);
    }

    #[traced_test]
    #[test]
    fn test_path_to_holder_follows_polarity() {
        let mut tree = MutexCoordinator::default();
        tree.request(NodeId(3)).unwrap();
        tree.request(NodeId(5)).unwrap();
        tree.release();

        assert_eq!(tree.path_to_holder(NodeId(5)), Some(ids(&[5, 1, 2, 3])));
        assert_eq!(tree.path_to_holder(NodeId(4)), Some(ids(&[4, 2, 3])));
        assert_eq!(tree.path_to_holder(NodeId(3)), Some(ids(&[3])));
        assert_eq!(tree.path_to_holder(NodeId(9)), None);
    }

    #[traced_test]
    #[test]
    fn test_forward_across_missing_edge_is_dropped() {
        let mut tree = MutexCoordinator::default();
        // Point leaf 4 at a child it does not have
        if let Some(node) = tree.nodes.get_mut(&NodeId(4)) {
            node.polarity = Polarity::TowardLeft;
        }

        let actions = tree.request(NodeId(4)).unwrap();
        assert_eq!(
            actions.last(),
            Some(&Action::ForwardDropped { from: NodeId(4) })
        );
        assert_eq!(queue(&tree, 4), ids(&[4]));
        assert!(logs_contain("request dropped"));
    }

    #[traced_test]
    #[test]
    fn test_handle_events() {
        let mut tree = MutexCoordinator::default();

        let actions = tree.handle(Event::Request { node: NodeId(1) });
        assert_eq!(
            actions,
            vec![Action::Rejected {
                event: Event::Request { node: NodeId(1) },
                reason: RejectReason::AlreadyHolder
            }]
        );

        let actions = tree.handle(Event::Request { node: NodeId(0) });
        assert!(matches!(
            actions.as_slice(),
            [Action::Rejected {
                reason: RejectReason::InvalidNodeId,
                ..
            }]
        ));

        tree.handle(Event::Request { node: NodeId(5) });
        let actions = tree.handle(Event::Release);
        assert!(actions.contains(&Action::RequestSatisfied { node: NodeId(5) }));
        assert_eq!(tree.holder(), NodeId(5));
    }
}
