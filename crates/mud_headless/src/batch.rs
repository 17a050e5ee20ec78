//! Batch fight runner for balance testing.
//!
//! Runs one scenario across many seeds in parallel using rayon and collects
//! per-combatant survival statistics.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::runner::{run_scenario, RunReport};
use crate::scenario::Scenario;

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of fights to run
    pub count: u32,
    /// Seed of the first fight; the rest follow consecutively
    pub seed_start: u64,
    /// Maximum parallel fights (0 = use rayon default)
    pub parallel: u32,
    /// Where to write results, if anywhere
    pub output: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 100,
            seed_start: 0,
            parallel: 0,
            output: None,
        }
    }
}

impl BatchConfig {
    /// Config for `count` fights
    #[must_use]
    pub fn new(count: u32) -> Self {
        Self {
            count,
            ..Default::default()
        }
    }

    /// Set seed start
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set output file
    #[must_use]
    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.output = Some(path);
        self
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Aggregate statistics over a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Fights completed
    pub fights: u32,
    /// Share of fights each combatant died in
    pub death_rates: BTreeMap<String, f64>,
    /// Mean vitality removed per fight, by attacker
    pub avg_damage: BTreeMap<String, f64>,
    /// Share of swings that landed
    pub landed_rate: f64,
    /// Mean fight length in pulses
    pub avg_pulses: f64,
    /// Shortest fight
    pub min_pulses: u64,
    /// Longest fight
    pub max_pulses: u64,
}

impl BatchSummary {
    /// Summarize `runs` of a scenario with combatants `names`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_runs(names: &[String], runs: &[RunReport]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }
        let n = runs.len() as f64;

        let death_rates = names
            .iter()
            .map(|name| {
                let deaths = runs.iter().filter(|r| r.died(name)).count();
                (name.clone(), deaths as f64 / n)
            })
            .collect();

        let mut avg_damage: BTreeMap<String, f64> = BTreeMap::new();
        for run in runs {
            for (name, dealt) in &run.damage_dealt {
                *avg_damage.entry(name.clone()).or_default() += *dealt as f64 / n;
            }
        }

        let swings: u64 = runs.iter().map(|r| r.swings).sum();
        let landed: u64 = runs.iter().map(|r| r.landed).sum();
        let total_pulses: u64 = runs.iter().map(|r| r.pulses).sum();

        Self {
            fights: u32::try_from(runs.len()).unwrap_or(u32::MAX),
            death_rates,
            avg_damage,
            landed_rate: if swings == 0 {
                0.0
            } else {
                landed as f64 / swings as f64
            },
            avg_pulses: total_pulses as f64 / n,
            min_pulses: runs.iter().map(|r| r.pulses).min().unwrap_or(0),
            max_pulses: runs.iter().map(|r| r.pulses).max().unwrap_or(0),
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario name
    pub scenario: String,
    /// Configuration used
    pub config: BatchConfig,
    /// Individual fight reports, in seed order
    pub runs: Vec<RunReport>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Run `config.count` fights of `scenario`.
pub fn run_batch(scenario: &Scenario, config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let completed = AtomicU32::new(0);

    info!(
        "Starting batch run: {} fights of '{}'",
        config.count, scenario.name
    );

    let run_all = || -> Vec<Result<RunReport, BatchError>> {
        (0..config.count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                let result = run_scenario(scenario, seed).map_err(|e| {
                    warn!("Fight with seed {} failed: {}", seed, e);
                    BatchError {
                        seed,
                        message: e.to_string(),
                    }
                });
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 10 == 0 {
                    debug!("Progress: {}/{}", done, config.count);
                }
                result
            })
            .collect()
    };

    let results = if config.parallel > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel as usize)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                warn!("Failed to build thread pool: {}, using default", e);
                run_all()
            }
        }
    } else {
        run_all()
    };

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let runs: Vec<RunReport> = runs.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let names: Vec<String> = scenario.combatants.iter().map(|c| c.name.clone()).collect();
    let summary = BatchSummary::from_runs(&names, &runs);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} fights in {:.1}s",
        runs.len(),
        duration_seconds
    );

    BatchResults {
        scenario: scenario.name.clone(),
        config,
        runs,
        summary,
        duration_seconds,
        errors,
    }
}

/// Verify determinism by running the same seed multiple times
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32) -> bool {
    let reports: Vec<RunReport> = match (0..runs)
        .map(|_| run_scenario(scenario, seed))
        .collect::<Result<_, _>>()
    {
        Ok(reports) => reports,
        Err(e) => {
            warn!("Determinism run failed: {}", e);
            return false;
        }
    };

    let Some(first) = reports.first() else {
        return true;
    };
    for (i, report) in reports.iter().enumerate().skip(1) {
        if report.final_hash != first.final_hash {
            warn!(
                "Determinism check failed: run 0 hash {} != run {} hash {}",
                first.final_hash, i, report.final_hash
            );
            return false;
        }
        if report != first {
            warn!("Determinism check failed: run {} report differs", i);
            return false;
        }
    }
    true
}
