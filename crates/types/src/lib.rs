//! Core types for Raymond's tree-based mutual exclusion.
//!
//! This crate holds the structural vocabulary shared by every other crate:
//!
//! - [`NodeId`]: identifies a node in the spanning tree
//! - [`Polarity`]: which adjacent edge currently leads toward the token holder
//! - [`TopologySpec`]: a serializable description of a binary tree
//! - [`TreeTopology`]: the validated, immutable arena built from a spec

mod identifiers;
mod topology;

pub use identifiers::{NodeId, Polarity};
pub use topology::{NodeSpec, TopologyError, TopologySpec, TreeTopology};
