//! Raymond mutual exclusion simulator CLI
//!
//! Drive a token tree by hand, run a seeded random workload against it, or
//! print a topology as TOML.

use clap::{Args, Parser, Subcommand};
use raymond_mutex::MutexCoordinator;
use raymond_simulation::{SimulationConfig, SimulationRunner};
use raymond_simulator::config::topology_to_toml;
use raymond_simulator::{InteractiveDriver, TopologySource};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "raymond-sim")]
#[command(about = "Token-based tree mutual exclusion simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Request, release and display from a menu on stdin
    Interactive {
        #[command(flatten)]
        tree: TreeArgs,
    },

    /// Run a seeded random workload and check invariants after every event
    Run {
        #[command(flatten)]
        tree: TreeArgs,

        /// Random seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of random events
        #[arg(long, default_value = "200")]
        steps: usize,

        /// Probability that an event is a request (0.0 to 1.0)
        #[arg(long, default_value = "0.6")]
        request_ratio: f64,

        /// Leave outstanding requests queued after the last step
        #[arg(long)]
        no_drain: bool,
    },

    /// Print the selected topology as TOML
    Topology {
        #[command(flatten)]
        tree: TreeArgs,
    },
}

#[derive(Args, Default)]
struct TreeArgs {
    /// TOML topology file
    #[arg(long, conflicts_with_all = ["complete_binary", "chain"])]
    topology: Option<PathBuf>,

    /// Generate a heap-layout tree with ids 1..=N
    #[arg(long, value_name = "N", conflicts_with = "chain")]
    complete_binary: Option<u32>,

    /// Generate a left-leaning chain with ids 1..=N
    #[arg(long, value_name = "N")]
    chain: Option<u32>,

    /// Node that starts with the token
    #[arg(long, value_name = "ID")]
    holder: Option<u32>,
}

impl TreeArgs {
    fn source(&self) -> TopologySource {
        if let Some(path) = &self.topology {
            TopologySource::File(path.clone())
        } else if let Some(n) = self.complete_binary {
            TopologySource::CompleteBinary(n)
        } else if let Some(n) = self.chain {
            TopologySource::Chain(n)
        } else {
            TopologySource::Fixture
        }
    }
}

fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli
        .command
        .unwrap_or(Commands::Interactive { tree: TreeArgs::default() })
    {
        Commands::Interactive { tree } => {
            // Logs would interleave with the menu, keep them quiet by default.
            init_tracing("warn");

            let spec = tree.source().load_with_holder(tree.holder)?;
            let coordinator = MutexCoordinator::new(&spec)?;
            let stdin = io::stdin();
            let stdout = io::stdout();
            InteractiveDriver::new(coordinator, stdin.lock(), stdout.lock()).run()?;
        }

        Commands::Run {
            tree,
            seed,
            steps,
            request_ratio,
            no_drain,
        } => {
            init_tracing("info");

            let spec = tree.source().load_with_holder(tree.holder)?;
            let config = SimulationConfig::new(spec)
                .with_seed(seed)
                .with_steps(steps)
                .with_request_ratio(request_ratio)
                .with_drain(!no_drain);

            let report = SimulationRunner::new(config)?.run()?;
            print!("{}", report);
        }

        Commands::Topology { tree } => {
            // No tracing: output goes to stdout
            let spec = tree.source().load_with_holder(tree.holder)?;
            MutexCoordinator::new(&spec)?;
            print!("{}", topology_to_toml(&spec)?);
        }
    }

    Ok(())
}
