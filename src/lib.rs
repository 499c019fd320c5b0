//! A/B/N Experiment Simulation Framework
//!
//! Simulates sequential A/B/N tests: every group accrues a fixed batch of
//! observations per period, successes are drawn from the group's hidden true
//! rate, and cumulative sample size, successes and observed rate are derived
//! once per run. Runs are deterministic under a fixed seed.
//!
//! # Modules
//! - `error` — Error taxonomy
//! - `config` — Experiment configuration, validation and loading
//! - `engine` — Simulation engine, trajectories and outcome sources
//! - `parallel` — Per-group substreams and the threaded runner
//! - `playback` — Read-only frame cursor over a finished run
//! - `summary` — Descriptive per-group statistics
//! - `replay` — Recorded outcome tapes and reproducibility validation
//! - `export` — JSON export of a run

pub mod error;
pub mod config;
pub mod engine;
pub mod parallel;
pub mod playback;
pub mod summary;
pub mod replay;
pub mod export;

pub use config::{ExperimentConfig, GroupSpec};
pub use engine::{run, run_with_source, GroupTrajectory, OutcomeSource, RngSource, SimulationResult};
pub use error::{SimError, SimResult};
pub use parallel::{run_parallel, run_seeded};

/// Crate version constant
pub const VERSION: &str = "1.0.0";
