//! Read-only view of the whole tree.

use crate::NodeStatus;
use raymond_types::{NodeId, Polarity};
use std::fmt;

/// State of one node at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub is_holder: bool,
    pub polarity: Polarity,
    pub status: NodeStatus,
    /// Queue contents, front first.
    pub queue: Vec<NodeId>,
}

/// Every node in tree preorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub holder: NodeId,
    pub nodes: Vec<NodeSnapshot>,
}

impl Snapshot {
    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Queue of `id`, or an empty slice for unknown ids.
    pub fn queue(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.queue.as_slice()).unwrap_or(&[])
    }

    /// Number of nodes flagged as holder. Always 1 for a consistent tree.
    pub fn holder_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_holder).count()
    }
}

/// Console layout: one line per node, `*` marks the holder.
///
/// ```text
/// 1  :Request queue: [5 ]
/// 3* :Request queue: [2 ]
/// ```
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            let marker = if node.is_holder { "*" } else { " " };
            write!(f, "{}{} :Request queue: [", node.id.as_u32(), marker)?;
            for entry in &node.queue {
                write!(f, "{} ", entry.as_u32())?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}
