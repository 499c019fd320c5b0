//! Outcome tapes and deterministic replay validation
//!
//! An [`OutcomeTape`] holds recorded per-period success counts and plays
//! them back through the engine as a finite randomness source. Replaying a
//! run's own tape must reproduce the run exactly.

use crate::config::{ExperimentConfig, GroupSpec};
use crate::engine::{run_with_source, OutcomeSource, SimulationResult};
use crate::error::{SimError, SimResult};
use crate::parallel::run_seeded;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Recorded success counts, indexed by group position then period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeTape {
    groups: Vec<Vec<u64>>,
}

impl OutcomeTape {
    pub fn new(groups: Vec<Vec<u64>>) -> Self {
        Self { groups }
    }

    /// Record the per-period successes of every group in `result`.
    pub fn from_result(result: &SimulationResult) -> Self {
        Self {
            groups: result
                .iter()
                .map(|g| g.successes_per_period().to_vec())
                .collect(),
        }
    }

    /// Recorded periods for the group at `index`.
    pub fn recorded(&self, index: usize) -> Option<&[u64]> {
        self.groups.get(index).map(Vec::as_slice)
    }
}

impl OutcomeSource for OutcomeTape {
    fn draw(&mut self, group: &GroupSpec<'_>, period: usize) -> SimResult<u64> {
        self.groups
            .get(group.index)
            .and_then(|periods| periods.get(period))
            .copied()
            .ok_or_else(|| SimError::RandomnessExhausted {
                group: group.name.to_string(),
                period,
            })
    }
}

/// Re-run the engine from a recorded tape.
pub fn replay(config: &ExperimentConfig, tape: &OutcomeTape) -> SimResult<SimulationResult> {
    let mut tape = tape.clone();
    run_with_source(config, &mut tape)
}

/// Result of replay validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayValidation {
    pub matches: bool,
    /// Groups whose replayed trajectory differs from the original
    pub mismatched_groups: Vec<String>,
}

impl ReplayValidation {
    fn compare(original: &SimulationResult, replayed: &SimulationResult) -> Self {
        let mut mismatched_groups: Vec<String> = original
            .iter()
            .filter(|g| replayed.group(g.name()) != Some(*g))
            .map(|g| g.name().to_string())
            .collect();
        for g in replayed.iter() {
            if original.group(g.name()).is_none() {
                mismatched_groups.push(g.name().to_string());
            }
        }

        let matches = mismatched_groups.is_empty() && original.n_periods() == replayed.n_periods();
        Self { matches, mismatched_groups }
    }
}

/// Replay `expected` from its own tape and compare trajectories.
pub fn validate_replay(config: &ExperimentConfig, expected: &SimulationResult) -> SimResult<ReplayValidation> {
    let replayed = replay(config, &OutcomeTape::from_result(expected))?;
    let validation = ReplayValidation::compare(expected, &replayed);
    log_validation("replay", &validation);
    Ok(validation)
}

/// Run the same seeded simulation twice and compare bit-for-bit.
pub fn validate_reproducibility(config: &ExperimentConfig, seed: u64) -> SimResult<ReplayValidation> {
    let first = run_seeded(config, seed)?;
    let second = run_seeded(config, seed)?;
    let validation = ReplayValidation::compare(&first, &second);
    log_validation("reproducibility", &validation);
    Ok(validation)
}

fn log_validation(kind: &str, validation: &ReplayValidation) {
    if validation.matches {
        debug!(kind, "Replay validation passed");
    } else {
        warn!(
            kind,
            mismatched = ?validation.mismatched_groups,
            "Replay produced different trajectories"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExperimentConfig {
        ExperimentConfig::new(
            vec!["Treatment Group".into(), "Control Group".into()],
            vec![100, 20],
            vec![0.05, 0.06],
            30,
        )
    }

    #[test]
    fn test_replay_reproduces_run() {
        let original = run_seeded(&config(), 17).unwrap();
        let tape = OutcomeTape::from_result(&original);
        let replayed = replay(&config(), &tape).unwrap();
        assert_eq!(original, replayed);
    }

    #[test]
    fn test_validate_replay_matches() {
        let original = run_seeded(&config(), 17).unwrap();
        let validation = validate_replay(&config(), &original).unwrap();
        assert!(validation.matches);
        assert!(validation.mismatched_groups.is_empty());
    }

    #[test]
    fn test_short_tape_exhausts() {
        let tape = OutcomeTape::new(vec![vec![1, 2], vec![3, 4, 5]]);
        let config = ExperimentConfig::new(vec!["A".into(), "B".into()], vec![10, 10], vec![0.5, 0.5], 3);
        let err = replay(&config, &tape).unwrap_err();
        assert_eq!(err, SimError::RandomnessExhausted { group: "A".into(), period: 2 });
    }

    #[test]
    fn test_missing_group_exhausts() {
        let tape = OutcomeTape::new(vec![vec![1, 1]]);
        let config = ExperimentConfig::new(vec!["A".into(), "B".into()], vec![10, 10], vec![0.5, 0.5], 2);
        let err = replay(&config, &tape).unwrap_err();
        assert_eq!(err, SimError::RandomnessExhausted { group: "B".into(), period: 0 });
    }

    #[test]
    fn test_tape_with_impossible_count() {
        let tape = OutcomeTape::new(vec![vec![11]]);
        let config = ExperimentConfig::new(vec!["A".into()], vec![10], vec![0.5], 1);
        assert!(matches!(
            replay(&config, &tape).unwrap_err(),
            SimError::InvalidOutcome { successes: 11, n_obs: 10, .. }
        ));
    }

    #[test]
    fn test_hand_written_tape() {
        let tape = OutcomeTape::new(vec![vec![2, 0, 5]]);
        let config = ExperimentConfig::new(vec!["A".into()], vec![5], vec![0.3], 3);
        let result = replay(&config, &tape).unwrap();
        let a = result.group("A").unwrap();
        assert_eq!(a.cumulative_n_success(), &[2, 2, 7]);
        assert_eq!(a.cumulative_n_obs(), &[5, 10, 15]);
        assert_eq!(tape.recorded(0), Some(&[2, 0, 5][..]));
        assert_eq!(tape.recorded(1), None);
    }

    #[test]
    fn test_mismatch_detected() {
        let original = run_seeded(&config(), 1).unwrap();
        let other = run_seeded(&config(), 2).unwrap();
        let validation = ReplayValidation::compare(&original, &other);
        assert!(!validation.matches);
        assert!(!validation.mismatched_groups.is_empty());
    }

    #[test]
    fn test_reproducibility() {
        let validation = validate_reproducibility(&config(), 2024).unwrap();
        assert!(validation.matches);
    }
}
