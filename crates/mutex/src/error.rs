//! Error types for the mutual exclusion coordinator.

use raymond_types::{NodeId, TopologyError};
use thiserror::Error;

/// Errors reported to the driver.
///
/// None of these are fatal: a rejected request leaves the tree untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutexError {
    /// The id is not part of the tree.
    #[error("invalid node id: {0}")]
    InvalidNodeId(NodeId),

    /// Request issued for the current holder.
    #[error("{0} already holds the token")]
    AlreadyHolder(NodeId),

    /// The tree could not be built.
    #[error("invalid topology: {0}")]
    InvalidTopology(#[from] TopologyError),
}
