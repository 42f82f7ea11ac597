//! Core types for the mutual-exclusion state machine.
//!
//! The driver feeds [`Event`]s into a [`StateMachine`] and receives the
//! resulting [`Action`]s: an ordered record of every observable transition
//! (requests queued and forwarded, token handoffs, satisfied requests).
//! The state machine performs no I/O; printing is the driver's job.

mod action;
mod event;
mod traits;

pub use action::{Action, RejectReason};
pub use event::Event;
pub use traits::StateMachine;
