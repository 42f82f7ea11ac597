//! Configuration for a simulation run.

use raymond_types::TopologySpec;

/// Configuration for a simulation run.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Tree to simulate.
    pub topology: TopologySpec,

    /// Number of random events to issue.
    pub steps: usize,

    /// Probability that an event is a request rather than a release.
    pub request_ratio: f64,

    /// Release until all queues are empty after the last step.
    pub drain: bool,

    /// Random seed for deterministic simulation.
    pub seed: u64,
}

impl SimulationConfig {
    /// Create a new configuration for the given tree.
    pub fn new(topology: TopologySpec) -> Self {
        Self {
            topology,
            steps: 200,
            request_ratio: 0.6,
            drain: true,
            seed: 12345,
        }
    }

    /// Set the number of steps.
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    /// Set the request ratio (clamped to `0.0..=1.0`).
    pub fn with_request_ratio(mut self, ratio: f64) -> Self {
        self.request_ratio = if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        };
        self
    }

    /// Enable or disable the final drain.
    pub fn with_drain(mut self, drain: bool) -> Self {
        self.drain = drain;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(TopologySpec::default_fixture())
    }
}
