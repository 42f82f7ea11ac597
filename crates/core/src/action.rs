//! Observable transitions emitted by the state machine.

use crate::Event;
use raymond_types::NodeId;
use std::fmt;

/// Why an event was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("node already has token")]
    AlreadyHolder,

    #[error("invalid node")]
    InvalidNodeId,
}

/// A single state transition, in the order it happened.
///
/// The driver decides whether and how to print these; the state machine
/// never does console I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // ═══════════════════════════════════════════════════════════════════════
    // Request propagation
    // ═══════════════════════════════════════════════════════════════════════
    /// `entry` was appended to `node`'s queue (`entry == node` for a self-request).
    RequestQueued { node: NodeId, entry: NodeId },

    /// `from` forwarded a request across its polarity edge to `to`.
    RequestForwarded { from: NodeId, to: NodeId },

    /// `from` had no neighbor across its polarity edge.
    ForwardDropped { from: NodeId },

    // ═══════════════════════════════════════════════════════════════════════
    // Token movement
    // ═══════════════════════════════════════════════════════════════════════
    /// The token moved from `from` to its neighbor `to`; `from` now points at `to`.
    TokenTransferred { from: NodeId, to: NodeId },

    /// `node` received the token with its own request at the front of its queue.
    RequestSatisfied { node: NodeId },

    /// Release with an empty queue: the holder keeps the token.
    TokenRetained { holder: NodeId },

    // ═══════════════════════════════════════════════════════════════════════
    // Errors
    // ═══════════════════════════════════════════════════════════════════════
    /// The event was not applied.
    Rejected { event: Event, reason: RejectReason },
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::RequestQueued { .. } => "RequestQueued",
            Action::RequestForwarded { .. } => "RequestForwarded",
            Action::ForwardDropped { .. } => "ForwardDropped",
            Action::TokenTransferred { .. } => "TokenTransferred",
            Action::RequestSatisfied { .. } => "RequestSatisfied",
            Action::TokenRetained { .. } => "TokenRetained",
            Action::Rejected { .. } => "Rejected",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::RequestQueued { node, entry } if node == entry => {
                write!(f, "{} added request to own queue", node.as_u32())
            }
            Action::RequestQueued { node, entry } => write!(
                f,
                "Added request of {} to queue of {}",
                entry.as_u32(),
                node.as_u32()
            ),
            Action::RequestForwarded { from, to } => {
                write!(f, "Request sent from {} to Node {}", from.as_u32(), to.as_u32())
            }
            Action::ForwardDropped { from } => write!(
                f,
                "Node {} has no neighbor toward the token, request dropped",
                from.as_u32()
            ),
            Action::TokenTransferred { from, to } => write!(
                f,
                "{} has released token, {} has obtained token",
                from.as_u32(),
                to.as_u32()
            ),
            Action::RequestSatisfied { node } => write!(
                f,
                "{} removed from the queue of {}",
                node.as_u32(),
                node.as_u32()
            ),
            Action::TokenRetained { .. } => {
                f.write_str("No outstanding requests, token remains with current holder")
            }
            Action::Rejected { event, reason } => write!(f, "{} rejected: {}", event, reason),
        }
    }
}
