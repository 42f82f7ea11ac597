//! Deterministic simulation runner.
//!
//! Drives a [`MutexCoordinator`](raymond_mutex::MutexCoordinator) with a
//! seeded stream of random `request`/`release` events and checks every
//! protocol invariant after each one. Given the same seed and topology, a run
//! produces identical results.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ChaCha8Rng(seed) ──► Event::Request / Event::Release   │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     MutexCoordinator::handle(event) → Vec<Action>  │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     check_invariants + SimulationStats             │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! After the last step the runner can drain: release until every queue is
//! empty, failing if any requester was never served.

mod checker;
mod config;
mod runner;

pub use checker::{check_cascade, check_invariants, check_snapshot, InvariantViolation};
pub use config::SimulationConfig;
pub use runner::{SimulationError, SimulationReport, SimulationRunner, SimulationStats};
