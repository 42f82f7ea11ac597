//! Tree topology: description, validation, and the immutable node arena.

use crate::{NodeId, Polarity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// One node of a [`TopologySpec`]: its id and its (optional) two children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<NodeId>,
}

impl NodeSpec {
    /// A node with the given children.
    pub fn new(id: u32, left: Option<u32>, right: Option<u32>) -> Self {
        Self {
            id: NodeId(id),
            left: left.map(NodeId),
            right: right.map(NodeId),
        }
    }

    /// A node without children.
    pub fn leaf(id: u32) -> Self {
        Self::new(id, None, None)
    }
}

/// Serializable description of a binary spanning tree and its initial token holder.
///
/// Parent links are implied by the child fields. The root is the single node
/// that no other node names as a child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySpec {
    /// Node that holds the token when the tree is built.
    pub initial_holder: NodeId,

    /// Every node in the tree, in any order.
    pub nodes: Vec<NodeSpec>,
}

impl TopologySpec {
    /// The classic 5-node, 2-level tree.
    ///
    /// ```text
    ///         1*
    ///        / \
    ///       2   5
    ///      / \
    ///     3   4
    /// ```
    ///
    /// Node 1 is the root and holds the token.
    pub fn default_fixture() -> Self {
        Self {
            initial_holder: NodeId(1),
            nodes: vec![
                NodeSpec::new(1, Some(2), Some(5)),
                NodeSpec::new(2, Some(3), Some(4)),
                NodeSpec::leaf(3),
                NodeSpec::leaf(4),
                NodeSpec::leaf(5),
            ],
        }
    }

    /// A degenerate tree where each node `i` has `i + 1` as its left child.
    ///
    /// Node 1 is the root and initial holder.
    pub fn chain(len: u32) -> Self {
        let nodes = (1..=len)
            .map(|id| NodeSpec::new(id, (id < len).then_some(id + 1), None))
            .collect();
        Self {
            initial_holder: NodeId(1),
            nodes,
        }
    }

    /// A complete binary tree in heap layout: node `i` has children `2i` and `2i + 1`.
    ///
    /// Node 1 is the root and initial holder.
    pub fn complete_binary(len: u32) -> Self {
        let child = |c: u32| (c <= len).then_some(c);
        let nodes = (1..=len)
            .map(|id| NodeSpec::new(id, child(2 * id), child(2 * id + 1)))
            .collect();
        Self {
            initial_holder: NodeId(1),
            nodes,
        }
    }

    /// Set the initial token holder.
    pub fn with_initial_holder(mut self, holder: NodeId) -> Self {
        self.initial_holder = holder;
        self
    }
}

impl Default for TopologySpec {
    fn default() -> Self {
        Self::default_fixture()
    }
}

/// Errors that can occur when building a tree from a [`TopologySpec`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("topology has no nodes")]
    Empty,

    #[error("node {0} is declared more than once")]
    DuplicateNode(NodeId),

    #[error("node {parent} names unknown child {child}")]
    UnknownChild { parent: NodeId, child: NodeId },

    #[error("node {0} names itself as a child")]
    SelfLoop(NodeId),

    #[error("node {parent} names {child} as both left and right child")]
    DuplicateChild { parent: NodeId, child: NodeId },

    #[error("node {0} has more than one parent")]
    MultipleParents(NodeId),

    /// Every node has a parent, so the links contain a cycle.
    #[error("topology has no root (every node has a parent)")]
    NoRoot,

    #[error("topology has more than one root: {0:?}")]
    MultipleRoots(Vec<NodeId>),

    /// Nodes on a cycle detached from the root.
    #[error("nodes not reachable from the root: {0:?}")]
    Unreachable(Vec<NodeId>),

    #[error("initial holder {0} is not in the topology")]
    UnknownHolder(NodeId),
}

/// Structural links of one node in the arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Links {
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// Validated, immutable binary tree.
///
/// Nodes live in an arena keyed by [`NodeId`]; relations are id references.
/// Built once, never mutated, dropped as a whole.
#[derive(Debug, Clone)]
pub struct TreeTopology {
    root: NodeId,
    initial_holder: NodeId,
    links: BTreeMap<NodeId, Links>,
    /// Node, left subtree, right subtree.
    preorder: Vec<NodeId>,
}

impl TreeTopology {
    /// Validate a spec and build the arena.
    pub fn build(spec: &TopologySpec) -> Result<Self, TopologyError> {
        if spec.nodes.is_empty() {
            return Err(TopologyError::Empty);
        }

        let mut links = BTreeMap::new();
        for node in &spec.nodes {
            let entry = Links {
                parent: None,
                left: node.left,
                right: node.right,
            };
            if links.insert(node.id, entry).is_some() {
                return Err(TopologyError::DuplicateNode(node.id));
            }
        }

        for node in &spec.nodes {
            if let (Some(left), Some(right)) = (node.left, node.right) {
                if left == right {
                    return Err(TopologyError::DuplicateChild {
                        parent: node.id,
                        child: left,
                    });
                }
            }
            for child in node.left.into_iter().chain(node.right) {
                if child == node.id {
                    return Err(TopologyError::SelfLoop(child));
                }
                let Some(entry) = links.get_mut(&child) else {
                    return Err(TopologyError::UnknownChild {
                        parent: node.id,
                        child,
                    });
                };
                if entry.parent.is_some() {
                    return Err(TopologyError::MultipleParents(child));
                }
                entry.parent = Some(node.id);
            }
        }

        let roots: Vec<NodeId> = links
            .iter()
            .filter(|(_, l)| l.parent.is_none())
            .map(|(id, _)| *id)
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(TopologyError::NoRoot),
            [root] => *root,
            _ => return Err(TopologyError::MultipleRoots(roots)),
        };

        // Every node has at most one parent and the root has none, so a walk
        // from the root cannot enter a cycle.
        let mut preorder = Vec::with_capacity(links.len());
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            preorder.push(id);
            if let Some(l) = links.get(&id) {
                stack.extend(l.right);
                stack.extend(l.left);
            }
        }

        if preorder.len() != links.len() {
            let reached: BTreeSet<NodeId> = preorder.iter().copied().collect();
            let unreachable = links
                .keys()
                .filter(|id| !reached.contains(id))
                .copied()
                .collect();
            return Err(TopologyError::Unreachable(unreachable));
        }

        if !links.contains_key(&spec.initial_holder) {
            return Err(TopologyError::UnknownHolder(spec.initial_holder));
        }

        Ok(Self {
            root,
            initial_holder: spec.initial_holder,
            links,
            preorder,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Structure
    // ═══════════════════════════════════════════════════════════════════════

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn initial_holder(&self) -> NodeId {
        self.initial_holder
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// A built tree always has at least one node.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.links.contains_key(&id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.links.get(&id).and_then(|l| l.parent)
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.links.get(&id).and_then(|l| l.left)
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.links.get(&id).and_then(|l| l.right)
    }

    /// All node ids in preorder (node, left subtree, right subtree).
    pub fn node_ids(&self) -> &[NodeId] {
        &self.preorder
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Polarity
    // ═══════════════════════════════════════════════════════════════════════

    /// The neighbor of `id` across the edge that `polarity` designates.
    ///
    /// `None` at a tree boundary (e.g. `TowardParent` at the root).
    pub fn neighbor(&self, id: NodeId, polarity: Polarity) -> Option<NodeId> {
        let links = self.links.get(&id)?;
        match polarity {
            Polarity::TowardParent => links.parent,
            Polarity::TowardLeft => links.left,
            Polarity::TowardRight => links.right,
        }
    }

    /// The polarity at `from` that designates the edge to `to`.
    ///
    /// `None` if the two nodes are not adjacent.
    pub fn polarity_toward(&self, from: NodeId, to: NodeId) -> Option<Polarity> {
        let links = self.links.get(&from)?;
        if links.parent == Some(to) {
            Some(Polarity::TowardParent)
        } else if links.left == Some(to) {
            Some(Polarity::TowardLeft)
        } else if links.right == Some(to) {
            Some(Polarity::TowardRight)
        } else {
            None
        }
    }

    /// Polarities that point every node at the initial holder.
    ///
    /// The holder itself gets `TowardParent`; it is rewritten on first release.
    pub fn initial_polarities(&self) -> BTreeMap<NodeId, Polarity> {
        let mut polarities = BTreeMap::new();
        polarities.insert(self.initial_holder, Polarity::TowardParent);

        let mut queue = VecDeque::from([self.initial_holder]);
        while let Some(current) = queue.pop_front() {
            let Some(links) = self.links.get(&current) else {
                continue;
            };
            for next in [links.parent, links.left, links.right].into_iter().flatten() {
                if polarities.contains_key(&next) {
                    continue;
                }
                if let Some(polarity) = self.polarity_toward(next, current) {
                    polarities.insert(next, polarity);
                    queue.push_back(next);
                }
            }
        }
        polarities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId).collect()
    }

    #[test]
    fn test_default_fixture_structure() {
        let tree = TreeTopology::build(&TopologySpec::default()).unwrap();

        assert_eq!(tree.len(), 5);
        assert_eq!(tree.root(), NodeId(1));
        assert_eq!(tree.initial_holder(), NodeId(1));
        assert_eq!(tree.node_ids(), ids(&[1, 2, 3, 4, 5]).as_slice());

        assert_eq!(tree.left(NodeId(1)), Some(NodeId(2)));
        assert_eq!(tree.right(NodeId(1)), Some(NodeId(5)));
        assert_eq!(tree.parent(NodeId(3)), Some(NodeId(2)));
        assert_eq!(tree.parent(NodeId(1)), None);
    }

    #[test]
    fn test_neighbor_and_polarity_toward() {
        let tree = TreeTopology::build(&TopologySpec::default()).unwrap();

        assert_eq!(tree.neighbor(NodeId(1), Polarity::TowardParent), None);
        assert_eq!(
            tree.neighbor(NodeId(2), Polarity::TowardRight),
            Some(NodeId(4))
        );
        assert_eq!(
            tree.polarity_toward(NodeId(1), NodeId(5)),
            Some(Polarity::TowardRight)
        );
        assert_eq!(
            tree.polarity_toward(NodeId(4), NodeId(2)),
            Some(Polarity::TowardParent)
        );
        // Not adjacent
        assert_eq!(tree.polarity_toward(NodeId(3), NodeId(1)), None);
    }

    #[test]
    fn test_initial_polarities_point_at_root_holder() {
        let tree = TreeTopology::build(&TopologySpec::default()).unwrap();
        let polarities = tree.initial_polarities();

        assert_eq!(polarities.len(), 5);
        assert!(polarities
            .values()
            .all(|p| *p == Polarity::TowardParent));
    }

    #[test]
    fn test_initial_polarities_point_at_leaf_holder() {
        let spec = TopologySpec::default().with_initial_holder(NodeId(3));
        let tree = TreeTopology::build(&spec).unwrap();
        let polarities = tree.initial_polarities();

        assert_eq!(polarities[&NodeId(1)], Polarity::TowardLeft);
        assert_eq!(polarities[&NodeId(2)], Polarity::TowardLeft);
        assert_eq!(polarities[&NodeId(4)], Polarity::TowardParent);
        assert_eq!(polarities[&NodeId(5)], Polarity::TowardParent);
    }

    #[test]
    fn test_chain_and_complete_binary() {
        let chain = TreeTopology::build(&TopologySpec::chain(4)).unwrap();
        assert_eq!(chain.node_ids(), ids(&[1, 2, 3, 4]).as_slice());
        assert_eq!(chain.parent(NodeId(4)), Some(NodeId(3)));

        let heap = TreeTopology::build(&TopologySpec::complete_binary(6)).unwrap();
        assert_eq!(heap.node_ids(), ids(&[1, 2, 4, 5, 3, 6]).as_slice());
        assert_eq!(heap.right(NodeId(3)), None);
    }

    #[test]
    fn test_rejects_malformed_topologies() {
        let build = |holder: u32, nodes: Vec<NodeSpec>| {
            TreeTopology::build(&TopologySpec {
                initial_holder: NodeId(holder),
                nodes,
            })
            .unwrap_err()
        };

        assert_eq!(build(1, vec![]), TopologyError::Empty);
        assert_eq!(
            build(1, vec![NodeSpec::leaf(1), NodeSpec::leaf(1)]),
            TopologyError::DuplicateNode(NodeId(1))
        );
        assert_eq!(
            build(1, vec![NodeSpec::new(1, Some(7), None)]),
            TopologyError::UnknownChild {
                parent: NodeId(1),
                child: NodeId(7)
            }
        );
        assert_eq!(
            build(1, vec![NodeSpec::new(1, Some(1), None)]),
            TopologyError::SelfLoop(NodeId(1))
        );
        assert_eq!(
            build(
                1,
                vec![NodeSpec::new(1, Some(2), Some(2)), NodeSpec::leaf(2)]
            ),
            TopologyError::DuplicateChild {
                parent: NodeId(1),
                child: NodeId(2)
            }
        );
        assert_eq!(
            build(
                1,
                vec![
                    NodeSpec::new(1, Some(3), None),
                    NodeSpec::new(2, Some(3), None),
                    NodeSpec::leaf(3),
                ]
            ),
            TopologyError::MultipleParents(NodeId(3))
        );
        assert_eq!(
            build(
                1,
                vec![
                    NodeSpec::new(1, Some(2), None),
                    NodeSpec::new(2, Some(1), None),
                ]
            ),
            TopologyError::NoRoot
        );
        assert_eq!(
            build(1, vec![NodeSpec::leaf(1), NodeSpec::leaf(2)]),
            TopologyError::MultipleRoots(ids(&[1, 2]))
        );
        assert_eq!(
            build(
                1,
                vec![
                    NodeSpec::leaf(1),
                    NodeSpec::new(2, Some(3), None),
                    NodeSpec::new(3, Some(2), None),
                ]
            ),
            TopologyError::Unreachable(ids(&[2, 3]))
        );
        assert_eq!(
            build(9, vec![NodeSpec::leaf(1)]),
            TopologyError::UnknownHolder(NodeId(9))
        );
    }

    #[test]
    fn test_spec_from_toml() {
        let spec: TopologySpec = toml::from_str(
            r#"
            initial_holder = 2

            [[nodes]]
            id = 1
            left = 2

            [[nodes]]
            id = 2
            "#,
        )
        .unwrap();

        assert_eq!(spec.initial_holder, NodeId(2));
        assert_eq!(spec.nodes, vec![NodeSpec::new(1, Some(2), None), NodeSpec::leaf(2)]);

        let tree = TreeTopology::build(&spec).unwrap();
        assert_eq!(tree.root(), NodeId(1));
    }
}
