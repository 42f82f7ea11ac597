//! Per-node protocol state.

use indexmap::IndexSet;
use raymond_types::{NodeId, Polarity};

/// FIFO of pending requests. Insertion order is queue order; an id appears at most once.
pub type RequestQueue = IndexSet<NodeId>;

/// A request was appended to a node's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    /// Edge across which the node must now forward a request, if any.
    pub forward: Option<Polarity>,
}

/// Coarse lifecycle of a node, derived from its token flag and queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// No token, nothing queued.
    Idle,
    /// Has an outstanding self-request.
    Waiting,
    /// Holds no token and no self-request, but relays requests for neighbors.
    Relaying,
    /// Holds the token.
    Holder,
}

/// Token flag, request queue, and polarity of one node.
///
/// Structural relations live in the topology; this struct only knows its own id.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub(crate) id: NodeId,
    pub(crate) holds_token: bool,
    pub(crate) queue: RequestQueue,
    pub(crate) polarity: Polarity,
}

impl NodeState {
    pub fn new(id: NodeId, polarity: Polarity, holds_token: bool) -> Self {
        Self {
            id,
            holds_token,
            queue: RequestQueue::new(),
            polarity,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn holds_token(&self) -> bool {
        self.holds_token
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Oldest pending entry.
    pub fn front(&self) -> Option<NodeId> {
        self.queue.first().copied()
    }

    pub fn has_self_request(&self) -> bool {
        self.queue.contains(&self.id)
    }

    pub fn status(&self) -> NodeStatus {
        if self.holds_token {
            NodeStatus::Holder
        } else if self.has_self_request() {
            NodeStatus::Waiting
        } else if !self.queue.is_empty() {
            NodeStatus::Relaying
        } else {
            NodeStatus::Idle
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Request propagation
    // ═══════════════════════════════════════════════════════════════════════

    /// Queue this node's own request.
    ///
    /// No-op (`None`) if the node holds the token or already asked. Only the
    /// first entry of an empty queue triggers a forward: a non-empty queue
    /// means a request is already outstanding across the polarity edge.
    pub fn send_request(&mut self) -> Option<Enqueued> {
        if self.holds_token || self.has_self_request() {
            return None;
        }
        let was_empty = self.queue.is_empty();
        self.queue.insert(self.id);
        Some(Enqueued {
            forward: was_empty.then_some(self.polarity),
        })
    }

    /// Queue a request forwarded by neighbor `sender`.
    ///
    /// No-op (`None`) if `sender` is already queued, which bounds propagation.
    /// A holder keeps the request for its next release; anyone else forwards.
    pub fn receive_request(&mut self, sender: NodeId) -> Option<Enqueued> {
        if !self.queue.insert(sender) {
            return None;
        }
        Some(Enqueued {
            forward: (!self.holds_token).then_some(self.polarity),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Token movement
    // ═══════════════════════════════════════════════════════════════════════

    /// Give up the token to the front of the queue, now reached via `toward`.
    ///
    /// Returns the popped entry.
    pub(crate) fn hand_off(&mut self, toward: Polarity) -> Option<NodeId> {
        let target = self.queue.shift_remove_index(0)?;
        self.polarity = toward;
        self.holds_token = false;
        Some(target)
    }

    pub(crate) fn take_token(&mut self) {
        self.holds_token = true;
    }

    /// Pop this node's own id if it is at the front of the queue.
    pub(crate) fn pop_self_request(&mut self) -> bool {
        if self.front() == Some(self.id) {
            self.queue.shift_remove_index(0);
            true
        } else {
            false
        }
    }
}
