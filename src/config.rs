//! Experiment configuration
//!
//! `ExperimentConfig` is immutable input to the engine. It can be built
//! directly, parsed from comma-separated lists (`treatment,control`,
//! `50,50`, `0.10,0.09`), or loaded from JSON.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Configuration of one simulated A/B/N experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Group labels, in plotting/legend order
    pub group_names: Vec<String>,
    /// Observations accrued per period, per group
    pub n_obs_per_period: Vec<u64>,
    /// Hidden success probability per group, in [0, 1]
    pub true_success_rate: Vec<f64>,
    /// Number of simulated periods
    pub n_periods: usize,
}

/// Borrowed view of a single group's slice of the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupSpec<'a> {
    pub index: usize,
    pub name: &'a str,
    pub n_obs_per_period: u64,
    pub true_success_rate: f64,
}

impl ExperimentConfig {
    /// Create a configuration. Call [`validate`](Self::validate) (or any
    /// engine entry point, which validates) before relying on it.
    pub fn new(
        group_names: Vec<String>,
        n_obs_per_period: Vec<u64>,
        true_success_rate: Vec<f64>,
        n_periods: usize,
    ) -> Self {
        Self {
            group_names,
            n_obs_per_period,
            true_success_rate,
            n_periods,
        }
    }

    /// Parse comma-separated argument lists.
    ///
    /// Numbers are trimmed before parsing; a malformed entry is reported with
    /// the argument it came from. The parsed config is validated.
    pub fn from_lists(
        group_names: &str,
        n_obs_per_period: &str,
        true_success_rates: &str,
        n_periods: usize,
    ) -> SimResult<Self> {
        let names: Vec<String> = group_names
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
        let n_obs = parse_list::<u64>("n_obs_per_period", n_obs_per_period)?;
        let rates = parse_list::<f64>("true_success_rate", true_success_rates)?;

        let config = Self::new(names, n_obs, rates, n_periods);
        config.validate()?;
        debug!(
            groups = config.group_count(),
            n_periods = config.n_periods,
            "Parsed experiment config from lists"
        );
        Ok(config)
    }

    /// Deserialize and validate a JSON configuration.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to read config file");
            SimError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        let config = Self::from_json(&json)?;
        debug!(path = %path.display(), groups = config.group_count(), "Loaded experiment config");
        Ok(config)
    }

    /// Number of groups as declared by `group_names`.
    pub fn group_count(&self) -> usize {
        self.group_names.len()
    }

    /// Check every configuration invariant.
    ///
    /// The length check runs first so that a mismatch is always reported
    /// as such, listing exactly the arguments that disagree with
    /// `group_names`.
    pub fn validate(&self) -> SimResult<()> {
        let g = self.group_names.len();

        let mut mismatched = Vec::new();
        if self.n_obs_per_period.len() != g {
            mismatched.push("n_obs_per_period");
        }
        if self.true_success_rate.len() != g {
            mismatched.push("true_success_rate");
        }
        if !mismatched.is_empty() {
            let mut arguments = vec!["group_names"];
            arguments.extend(mismatched);
            return Err(SimError::configuration(
                &arguments,
                format!(
                    "arguments must all have the same length (group_names={}, n_obs_per_period={}, true_success_rate={})",
                    g,
                    self.n_obs_per_period.len(),
                    self.true_success_rate.len()
                ),
            ));
        }

        if g == 0 {
            return Err(SimError::configuration(&["group_names"], "at least one group is required"));
        }

        let mut seen = HashSet::with_capacity(g);
        for name in &self.group_names {
            if name.is_empty() {
                return Err(SimError::configuration(&["group_names"], "group names must be non-empty"));
            }
            if !seen.insert(name.as_str()) {
                return Err(SimError::configuration(
                    &["group_names"],
                    format!("duplicate group name {:?}", name),
                ));
            }
        }

        if let Some(idx) = self.n_obs_per_period.iter().position(|&n| n == 0) {
            return Err(SimError::configuration(
                &["n_obs_per_period"],
                format!("group {:?} must observe at least one unit per period", self.group_names[idx]),
            ));
        }

        if let Some(idx) = self
            .true_success_rate
            .iter()
            .position(|p| !(0.0..=1.0).contains(p))
        {
            return Err(SimError::configuration(
                &["true_success_rate"],
                format!(
                    "rate {} for group {:?} is outside [0, 1]",
                    self.true_success_rate[idx], self.group_names[idx]
                ),
            ));
        }

        if self.n_periods == 0 {
            return Err(SimError::configuration(&["n_periods"], "at least one period is required"));
        }

        // Final cumulative_n_obs must fit in u64.
        if let Some(idx) = self
            .n_obs_per_period
            .iter()
            .position(|&n| n.checked_mul(self.n_periods as u64).is_none())
        {
            return Err(SimError::configuration(
                &["n_obs_per_period", "n_periods"],
                format!(
                    "group {:?} would observe more than u64::MAX units over {} periods",
                    self.group_names[idx], self.n_periods
                ),
            ));
        }

        Ok(())
    }

    /// Per-group views in configuration order.
    ///
    /// Assumes a validated config; surplus entries in longer lists are ignored.
    pub fn groups(&self) -> impl Iterator<Item = GroupSpec<'_>> {
        self.group_names
            .iter()
            .zip(&self.n_obs_per_period)
            .zip(&self.true_success_rate)
            .enumerate()
            .map(|(index, ((name, &n_obs), &rate))| GroupSpec {
                index,
                name,
                n_obs_per_period: n_obs,
                true_success_rate: rate,
            })
    }
}

fn parse_list<T: std::str::FromStr>(argument: &str, input: &str) -> SimResult<Vec<T>> {
    input
        .split(',')
        .map(|raw| {
            let value = raw.trim();
            value.parse::<T>().map_err(|_| SimError::Parse {
                argument: argument.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}
