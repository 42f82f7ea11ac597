//! Inbound events.

use raymond_types::NodeId;
use std::fmt;

/// Operations a driver can submit to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// `node` wants the token.
    Request { node: NodeId },

    /// The current holder gives up the token.
    Release,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Request { node } => write!(f, "request({})", node),
            Event::Release => f.write_str("release()"),
        }
    }
}
