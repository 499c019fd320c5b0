//! Descriptive statistics of a finished run
//!
//! Reports how far each group's observed rate ended up from its true rate.
//! Nothing here compares groups against each other.

use crate::engine::{GroupTrajectory, SimulationResult};
use serde::{Deserialize, Serialize};

/// Final state of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub name: String,
    pub total_obs: u64,
    pub total_successes: u64,
    pub observed_rate: f64,
    pub true_rate: f64,
    /// |observed_rate - true_rate|
    pub absolute_error: f64,
    /// Binomial standard error of the observed rate at the true rate
    pub standard_error: f64,
}

impl GroupSummary {
    pub fn from_trajectory(trajectory: &GroupTrajectory) -> Self {
        let (total_obs, total_successes, observed_rate) = match trajectory.last() {
            Some(last) => (
                last.cumulative_n_obs,
                last.cumulative_n_success,
                last.cumulative_success_rate,
            ),
            None => (0, 0, 0.0),
        };
        let true_rate = trajectory.true_success_rate();
        let standard_error = if total_obs == 0 {
            0.0
        } else {
            (true_rate * (1.0 - true_rate) / total_obs as f64).sqrt()
        };

        Self {
            name: trajectory.name().to_string(),
            total_obs,
            total_successes,
            observed_rate,
            true_rate,
            absolute_error: (observed_rate - true_rate).abs(),
            standard_error,
        }
    }

    /// Absolute error measured in standard errors.
    ///
    /// Zero when the standard error is zero (true rate of 0 or 1), where the
    /// observed rate always equals the true rate.
    pub fn error_in_standard_errors(&self) -> f64 {
        if self.standard_error == 0.0 {
            return 0.0;
        }
        self.absolute_error / self.standard_error
    }
}

/// Summary of every group, in configuration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub n_periods: usize,
    pub groups: Vec<GroupSummary>,
}

impl RunSummary {
    pub fn from_result(result: &SimulationResult) -> Self {
        Self {
            n_periods: result.n_periods(),
            groups: result.iter().map(GroupSummary::from_trajectory).collect(),
        }
    }

    pub fn group(&self, name: &str) -> Option<&GroupSummary> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Total observations across groups.
    pub fn total_obs(&self) -> u64 {
        self.groups.iter().map(|g| g.total_obs).sum()
    }

    /// Build a summary string.
    pub fn summary(&self) -> String {
        let groups: Vec<String> = self
            .groups
            .iter()
            .map(|g| {
                format!(
                    "{}: {}/{} = {:.4} (true {:.4})",
                    g.name, g.total_successes, g.total_obs, g.observed_rate, g.true_rate
                )
            })
            .collect();
        format!("Periods: {} | {}", self.n_periods, groups.join(" | "))
    }
}
