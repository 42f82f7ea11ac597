//! Drivers for the Raymond mutual exclusion simulator.
//!
//! The core crates perform no I/O. This crate supplies the outer surface:
//!
//! - **Topology loading**: the built-in tree, generated trees, or a TOML file
//! - **Interactive driver**: the classic request / release / display menu
//!   over any `BufRead`/`Write` pair
//!
//! The `raymond-sim` binary wires these to stdin/stdout and adds a seeded,
//! invariant-checked workload run on top of `raymond-simulation`.
//!
//! # Example
//!
//! ```ignore
//! use raymond_simulator::{InteractiveDriver, TopologySource};
//!
//! let spec = TopologySource::Fixture.load()?;
//! let tree = MutexCoordinator::new(&spec)?;
//! InteractiveDriver::new(tree, stdin.lock(), stdout.lock()).run()?;
//! ```

pub mod config;
pub mod driver;

pub use config::{ConfigError, TopologySource};
pub use driver::InteractiveDriver;
