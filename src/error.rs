//! Error types for the simulation engine
//!
//! Every failure is surfaced synchronously to the caller; nothing is retried.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;

/// Top-level simulation error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Invalid experiment configuration, raised before any sampling.
    #[error("Configuration error in [{}]: {reason}", .arguments.join(", "))]
    Configuration { arguments: Vec<String>, reason: String },

    /// A bounded outcome source could not supply a draw.
    #[error("Randomness exhausted for group {group} at period {period}")]
    RandomnessExhausted { group: String, period: usize },

    /// An outcome source produced more successes than observations.
    #[error("Invalid outcome for group {group} at period {period}: {successes} successes out of {n_obs}")]
    InvalidOutcome {
        group: String,
        period: usize,
        successes: u64,
        n_obs: u64,
    },

    /// Malformed entry in a comma-separated argument list.
    #[error("Cannot parse {argument}: {value:?}")]
    Parse { argument: String, value: String },

    /// Config or export file could not be read or written.
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    /// Invalid JSON, or JSON that breaks a trajectory invariant.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// Build a configuration error naming the offending arguments.
    pub fn configuration(arguments: &[&str], reason: impl Into<String>) -> Self {
        SimError::Configuration {
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
            reason: reason.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, SimError::Configuration { .. })
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::Serialization(e.to_string())
    }
}
