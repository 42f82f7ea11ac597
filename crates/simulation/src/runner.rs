//! Seeded workload runner.

use crate::{check_cascade, check_invariants, InvariantViolation, SimulationConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use raymond_core::{Action, Event, StateMachine};
use raymond_mutex::{MutexCoordinator, MutexError, Snapshot};
use raymond_types::NodeId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end a simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Setup(#[from] MutexError),

    #[error("invariant violated at step {step} ({event}): {violation}")]
    Invariant {
        step: usize,
        event: Event,
        violation: InvariantViolation,
    },
}

/// Counters collected over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationStats {
    /// Events issued, including drain releases.
    pub steps: usize,
    /// Requests that queued a new self-request.
    pub requests_issued: usize,
    /// Requests absorbed because the node was already waiting.
    pub requests_coalesced: usize,
    /// Requests rejected because the node held the token.
    pub requests_rejected: usize,
    pub releases: usize,
    /// Releases that found an empty queue.
    pub releases_retained: usize,
    /// Single-edge token moves.
    pub handoffs: usize,
    /// Request hops between neighbors.
    pub forwards: usize,
    /// Longest cascade triggered by one release.
    pub max_cascade: usize,
    pub requests_satisfied: usize,
    /// Longest wait, in steps, between a request and its satisfaction.
    pub max_wait_steps: usize,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub seed: u64,
    pub stats: SimulationStats,
    pub final_holder: NodeId,
    pub final_snapshot: Snapshot,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "seed:               {}", self.seed)?;
        writeln!(f, "steps:              {}", s.steps)?;
        writeln!(
            f,
            "requests:           {} issued, {} coalesced, {} rejected",
            s.requests_issued, s.requests_coalesced, s.requests_rejected
        )?;
        writeln!(
            f,
            "releases:           {} ({} retained)",
            s.releases, s.releases_retained
        )?;
        writeln!(f, "request forwards:   {}", s.forwards)?;
        writeln!(f, "token handoffs:     {}", s.handoffs)?;
        writeln!(f, "longest cascade:    {}", s.max_cascade)?;
        writeln!(f, "satisfied:          {}", s.requests_satisfied)?;
        writeln!(f, "longest wait:       {} steps", s.max_wait_steps)?;
        writeln!(f, "final holder:       {}", self.final_holder)?;
        write!(f, "{}", self.final_snapshot)
    }
}

/// Drives one tree through a seeded random workload.
pub struct SimulationRunner {
    tree: MutexCoordinator,
    config: SimulationConfig,
    rng: ChaCha8Rng,
    /// Outstanding self-requests: node -> step at which it asked.
    pending: BTreeMap<NodeId, usize>,
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Build the configured tree.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        let tree = MutexCoordinator::new(&config.topology)?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Self {
            tree,
            config,
            rng,
            pending: BTreeMap::new(),
            stats: SimulationStats::default(),
        })
    }

    pub fn tree(&self) -> &MutexCoordinator {
        &self.tree
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Nodes with outstanding requests.
    pub fn pending(&self) -> BTreeSet<NodeId> {
        self.pending.keys().copied().collect()
    }

    /// Run all configured steps, then drain if enabled.
    pub fn run(mut self) -> Result<SimulationReport, SimulationError> {
        info!(
            seed = self.config.seed,
            steps = self.config.steps,
            nodes = self.tree.topology().len(),
            "Starting simulation"
        );

        for _ in 0..self.config.steps {
            let event = self.next_event();
            self.apply(event)?;
        }

        if self.config.drain {
            self.drain()?;
        }

        info!(
            handoffs = self.stats.handoffs,
            satisfied = self.stats.requests_satisfied,
            holder = %self.tree.holder(),
            "Simulation complete"
        );

        Ok(SimulationReport {
            seed: self.config.seed,
            final_holder: self.tree.holder(),
            final_snapshot: self.tree.snapshot(),
            stats: self.stats,
        })
    }

    /// Pick a random event.
    pub fn next_event(&mut self) -> Event {
        let ids = self.tree.topology().node_ids();
        if self.rng.gen_bool(self.config.request_ratio) {
            let node = ids[self.rng.gen_range(0..ids.len())];
            Event::Request { node }
        } else {
            Event::Release
        }
    }

    /// Apply one event, update statistics, and check invariants.
    pub fn apply(&mut self, event: Event) -> Result<Vec<Action>, SimulationError> {
        let step = self.stats.steps;
        self.stats.steps += 1;

        let outstanding = self.tree.outstanding_requests();
        let actions = self.tree.handle(event);
        debug!(step, %event, actions = actions.len(), "Applied event");

        let fail = move |violation: InvariantViolation| SimulationError::Invariant {
            step,
            event,
            violation,
        };

        match event {
            Event::Request { node } => {
                if matches!(actions.first(), Some(Action::Rejected { .. })) {
                    self.stats.requests_rejected += 1;
                } else if actions.is_empty() {
                    self.stats.requests_coalesced += 1;
                } else {
                    self.stats.requests_issued += 1;
                    self.pending.insert(node, step);
                }
            }
            Event::Release => {
                self.stats.releases += 1;
                let hops = actions
                    .iter()
                    .filter(|a| matches!(a, Action::TokenTransferred { .. }))
                    .count();
                if hops == 0 {
                    self.stats.releases_retained += 1;
                }
                check_cascade(hops, outstanding).map_err(fail)?;
                self.stats.handoffs += hops;
                self.stats.max_cascade = self.stats.max_cascade.max(hops);
            }
        }

        for action in &actions {
            debug!(step, action = action.type_name(), "{}", action);
            match action {
                Action::RequestForwarded { .. } => self.stats.forwards += 1,
                Action::RequestSatisfied { node } => {
                    if let Some(asked_at) = self.pending.remove(node) {
                        self.stats.requests_satisfied += 1;
                        let wait = step - asked_at;
                        self.stats.max_wait_steps = self.stats.max_wait_steps.max(wait);
                    }
                }
                _ => {}
            }
        }

        check_invariants(&self.tree, &self.pending()).map_err(fail)?;
        Ok(actions)
    }

    /// Release until the holder's queue is empty.
    ///
    /// Every outstanding request must be served by then.
    pub fn drain(&mut self) -> Result<(), SimulationError> {
        // Every release from a non-empty queue ends at a requester, so
        // `outstanding` releases suffice. The limit only stops a stuck tree.
        let limit = self.tree.topology().len() * (self.tree.outstanding_requests() + 1);

        for _ in 0..limit {
            if self.tree.outstanding_requests() == 0 {
                break;
            }
            self.apply(Event::Release)?;
        }

        if !self.pending.is_empty() || self.tree.outstanding_requests() != 0 {
            let stranded: Vec<NodeId> = self.pending.keys().copied().collect();
            warn!(?stranded, "Requests left unserved after drain");
            return Err(SimulationError::Invariant {
                step: self.stats.steps,
                event: Event::Release,
                violation: InvariantViolation::Stranded(stranded),
            });
        }
        Ok(())
    }
}
