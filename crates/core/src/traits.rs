//! Core traits for state machines.

use crate::{Action, Event};

/// A state machine that processes events.
///
/// - **Synchronous**: No async, no `.await`
/// - **Deterministic**: Same state + event = same actions
/// - **Pure-ish**: Mutates self, but performs no I/O
///
/// # Example
///
/// ```ignore
/// let mut tree = MutexCoordinator::default();
/// for action in tree.handle(Event::Request { node: NodeId(3) }) {
///     println!("{action}");
/// }
/// ```
pub trait StateMachine {
    /// Process an event, returning the transitions it caused in causal order.
    ///
    /// Rejected events produce a single [`Action::Rejected`] and leave the
    /// state untouched.
    fn handle(&mut self, event: Event) -> Vec<Action>;
}
