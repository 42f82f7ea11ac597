//! Raymond's tree-based mutual exclusion.
//!
//! A single privilege token lives at one node of a binary spanning tree.
//! Every other node keeps a polarity (the edge leading toward the holder) and
//! a FIFO of pending requests. This crate provides the synchronous state
//! machine for that protocol:
//!
//! - `MutexCoordinator::request` → queue a self-request and forward it along
//!   polarity edges until it reaches a node that already knows, or the holder
//! - `MutexCoordinator::release` → hand the token to the front of the holder's
//!   queue, cascading through relay nodes until a node that asked for itself
//!   holds it
//! - `MutexCoordinator::snapshot` → read-only view of every node
//!
//! The coordinator also implements [`raymond_core::StateMachine`], so a driver
//! can feed it `Event`s and print the returned `Action`s.

mod coordinator;
mod error;
mod node;
mod snapshot;

pub use coordinator::{MutexCoordinator, ReleaseOutcome};
pub use error::MutexError;
pub use node::{Enqueued, NodeState, NodeStatus, RequestQueue};
pub use snapshot::{NodeSnapshot, Snapshot};
