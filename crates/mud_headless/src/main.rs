//! Headless combat runner CLI.
//!
//! Usage:
//!   mud_headless                     # Interactive session on the built-in duel
//!   mud_headless session -s FILE     # Interactive session on a scenario
//!   mud_headless run -s FILE         # Run to completion, print the report
//!   mud_headless batch -c 1000       # Balance batch
//!   mud_headless verify              # Determinism check

use std::io::{self, BufWriter};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mud_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::{run_scenario, HeadlessRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "mud_headless")]
#[command(about = "Headless MUD combat runner for scenario testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a fight with JSON commands on stdin
    Session {
        /// Scenario file to load (built-in duel when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed (the scenario's own when absent)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a scenario to completion and print the report
    Run {
        /// Scenario file to load (built-in duel when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed (the scenario's own when absent)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a batch of fights for balance testing
    Batch {
        /// Scenario file to load (built-in duel when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of fights to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel fights (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output file for results
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Scenario file to load (built-in duel when absent)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Session { scenario, seed }) => cmd_session(scenario, seed),
        Some(Commands::Run { scenario, seed }) => cmd_run(scenario, seed),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
        }) => cmd_batch(scenario, count, parallel, output, seed),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
        }) => cmd_verify(scenario, seed, runs),
        None => {
            // Default: interactive mode
            cmd_session(None, None);
        }
    }
}

/// Load the scenario at `path`, or the built-in duel. Exits on failure.
fn load_scenario(path: Option<PathBuf>) -> Scenario {
    let Some(path) = path else {
        return Scenario::duel();
    };
    match Scenario::load(&path) {
        Ok(scenario) => {
            tracing::info!("Loaded scenario '{}' from {}", scenario.name, path.display());
            scenario
        }
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    }
}

/// Drive a fight interactively
fn cmd_session(scenario: Option<PathBuf>, seed: Option<u64>) {
    let scenario = load_scenario(scenario);
    let seed = seed.unwrap_or(scenario.seed);
    tracing::info!("Starting interactive session on '{}'", scenario.name);

    let mut runner = match HeadlessRunner::from_scenario(&scenario, seed) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to build scenario: {e}");
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let stdout = BufWriter::new(io::stdout().lock());
    if let Err(e) = runner.run(stdin.lock(), stdout) {
        tracing::error!("Session failed: {}", e);
        std::process::exit(1);
    }
}

/// Run a single fight to completion
fn cmd_run(scenario: Option<PathBuf>, seed: Option<u64>) {
    let scenario = load_scenario(scenario);
    let seed = seed.unwrap_or(scenario.seed);

    let report = match run_scenario(&scenario, seed) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Run failed: {e}");
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize report: {e}");
            std::process::exit(1);
        }
    }
}

/// Run batch of fights for balance testing
fn cmd_batch(
    scenario: Option<PathBuf>,
    count: u32,
    parallel: u32,
    output: Option<PathBuf>,
    seed: u64,
) {
    let scenario = load_scenario(scenario);
    let config = BatchConfig {
        count,
        seed_start: seed,
        parallel,
        output: output.clone(),
    };

    let results = run_batch(&scenario, config);

    eprintln!();
    eprintln!("=== Batch '{}': {} fights ===", results.scenario, results.summary.fights);
    eprintln!(
        "Pulses: avg {:.0}, min {}, max {}",
        results.summary.avg_pulses, results.summary.min_pulses, results.summary.max_pulses
    );
    eprintln!("Landed: {:.1}%", results.summary.landed_rate * 100.0);
    for (name, rate) in &results.summary.death_rates {
        eprintln!("  {name:<16} died in {:>5.1}%", rate * 100.0);
    }
    if !results.errors.is_empty() {
        eprintln!("Errors: {}", results.errors.len());
    }

    if let Some(path) = output {
        match results.save(&path) {
            Ok(()) => eprintln!("Results saved to {}", path.display()),
            Err(e) => {
                eprintln!("Failed to save results: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Verify determinism
fn cmd_verify(scenario: Option<PathBuf>, seed: u64, runs: u32) {
    let scenario = load_scenario(scenario);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    if verify_determinism(&scenario, seed, runs) {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}
