//! Headless combat runner for scenario testing and CI verification.
//!
//! This crate drives the combat core without a game server around it.
//! A fight is described by a RON [`scenario::Scenario`] and can be:
//!
//! - **Driven interactively**: JSON commands on stdin, responses on stdout
//! - **Run to completion**: one [`runner::RunReport`] per seed
//! - **Batched**: many seeds in parallel with survival statistics
//! - **Verified**: the same seed run repeatedly must agree
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (pulse, act, query, hash, quit)
//! - **stdout**: Responses and fight state (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full command/response reference.
//!
//! # Example
//!
//! ```bash
//! # Drive the built-in duel interactively
//! echo '{"cmd":"pulse","count":60}' | cargo run -p mud_headless
//!
//! # Run a scenario to the end
//! cargo run -p mud_headless -- run --scenario scenarios/duel.ron --seed 7
//!
//! # Verify determinism
//! cargo run -p mud_headless -- verify --scenario scenarios/gate.ron
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, BatchSummary};
pub use protocol::{CombatantState, Command, Response};
pub use runner::{run_scenario, HeadlessRunner, RunReport};
pub use scenario::{BuiltScenario, Scenario, ScenarioError};
