//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Get the raw ID value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// The adjacent edge a node currently considers to lead toward the token holder.
///
/// Only meaningful at nodes that do not hold the token. The holder's polarity
/// is rewritten when it releases, so its stale value is never followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    /// The token lies beyond the parent edge.
    TowardParent,
    /// The token lies in the left subtree.
    TowardLeft,
    /// The token lies in the right subtree.
    TowardRight,
}

impl Polarity {
    /// Short label used in console output.
    pub fn label(&self) -> &'static str {
        match self {
            Polarity::TowardParent => "up",
            Polarity::TowardLeft => "left",
            Polarity::TowardRight => "right",
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
