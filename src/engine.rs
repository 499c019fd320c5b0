//! Deterministic simulation engine
//!
//! For every group and period the engine draws the period's success count
//! from an [`OutcomeSource`], then aggregates it into running totals. The
//! aggregation happens exactly once, in [`GroupSimulator::step`]; consumers
//! only ever index the finished sequences.
//!
//! The engine performs no I/O and no logging. Its only side effect is the
//! randomness it consumes.

use crate::config::{ExperimentConfig, GroupSpec};
use crate::error::{SimError, SimResult};
use rand::Rng;
use rand_distr::{Binomial, Distribution};
use serde::{Deserialize, Serialize};

/// Source of per-period success counts.
///
/// `draw` returns the number of successes among `n_obs` trials with
/// success probability `p`. Implementations must return a value in
/// `0..=n_obs`; the engine rejects anything larger.
pub trait OutcomeSource {
    fn draw(&mut self, group: &GroupSpec<'_>, period: usize) -> SimResult<u64>;
}

/// Outcome source backed by a pseudo-random generator.
///
/// One Binomial(n, p) draw per period, distributionally identical to
/// summing `n` Bernoulli(p) trials.
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: Rng> OutcomeSource for RngSource<R> {
    fn draw(&mut self, group: &GroupSpec<'_>, _period: usize) -> SimResult<u64> {
        // p == 0.0 and p == 1.0 are valid and sample to 0 and n.
        let binomial = Binomial::new(group.n_obs_per_period, group.true_success_rate).map_err(|e| {
            SimError::configuration(&["true_success_rate"], format!("group {:?}: {}", group.name, e))
        })?;
        Ok(binomial.sample(&mut self.rng))
    }
}

/// Outcome of a single simulated period, with the running totals after it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodOutcome {
    pub period: usize,
    pub successes: u64,
    pub cumulative_n_obs: u64,
    pub cumulative_n_success: u64,
    pub cumulative_success_rate: f64,
}

/// Full simulated trajectory of one group.
///
/// All four sequences have the same length, one entry per period.
/// Fields are read-only once the trajectory is built; deserialization
/// rejects input that breaks the equal-length invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGroupTrajectory")]
pub struct GroupTrajectory {
    name: String,
    n_obs_per_period: u64,
    true_success_rate: f64,
    successes_per_period: Vec<u64>,
    cumulative_n_obs: Vec<u64>,
    cumulative_n_success: Vec<u64>,
    cumulative_success_rate: Vec<f64>,
}

impl GroupTrajectory {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_obs_per_period(&self) -> u64 {
        self.n_obs_per_period
    }

    pub fn true_success_rate(&self) -> f64 {
        self.true_success_rate
    }

    pub fn successes_per_period(&self) -> &[u64] {
        &self.successes_per_period
    }

    pub fn cumulative_n_obs(&self) -> &[u64] {
        &self.cumulative_n_obs
    }

    pub fn cumulative_n_success(&self) -> &[u64] {
        &self.cumulative_n_success
    }

    pub fn cumulative_success_rate(&self) -> &[f64] {
        &self.cumulative_success_rate
    }

    /// Number of simulated periods.
    pub fn len(&self) -> usize {
        self.successes_per_period.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successes_per_period.is_empty()
    }

    /// Running totals after `period`, if it was simulated.
    pub fn period(&self, period: usize) -> Option<PeriodOutcome> {
        Some(PeriodOutcome {
            period,
            successes: *self.successes_per_period.get(period)?,
            cumulative_n_obs: *self.cumulative_n_obs.get(period)?,
            cumulative_n_success: *self.cumulative_n_success.get(period)?,
            cumulative_success_rate: *self.cumulative_success_rate.get(period)?,
        })
    }

    /// Totals after the last period.
    pub fn last(&self) -> Option<PeriodOutcome> {
        self.len().checked_sub(1).and_then(|t| self.period(t))
    }
}

/// Wire form of [`GroupTrajectory`], checked before conversion.
#[derive(Deserialize)]
struct RawGroupTrajectory {
    name: String,
    n_obs_per_period: u64,
    true_success_rate: f64,
    successes_per_period: Vec<u64>,
    cumulative_n_obs: Vec<u64>,
    cumulative_n_success: Vec<u64>,
    cumulative_success_rate: Vec<f64>,
}

impl TryFrom<RawGroupTrajectory> for GroupTrajectory {
    type Error = SimError;

    fn try_from(raw: RawGroupTrajectory) -> SimResult<Self> {
        let n = raw.successes_per_period.len();
        if raw.cumulative_n_obs.len() != n
            || raw.cumulative_n_success.len() != n
            || raw.cumulative_success_rate.len() != n
        {
            return Err(SimError::Serialization(format!(
                "trajectory {:?} has sequences of unequal length ({}, {}, {}, {})",
                raw.name,
                n,
                raw.cumulative_n_obs.len(),
                raw.cumulative_n_success.len(),
                raw.cumulative_success_rate.len()
            )));
        }

        Ok(Self {
            name: raw.name,
            n_obs_per_period: raw.n_obs_per_period,
            true_success_rate: raw.true_success_rate,
            successes_per_period: raw.successes_per_period,
            cumulative_n_obs: raw.cumulative_n_obs,
            cumulative_n_success: raw.cumulative_n_success,
            cumulative_success_rate: raw.cumulative_success_rate,
        })
    }
}

/// Simulated trajectories of every group, in configuration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSimulationResult")]
pub struct SimulationResult {
    n_periods: usize,
    groups: Vec<GroupTrajectory>,
}

/// Wire form of [`SimulationResult`]; every group must span `n_periods`.
#[derive(Deserialize)]
struct RawSimulationResult {
    n_periods: usize,
    groups: Vec<GroupTrajectory>,
}

impl TryFrom<RawSimulationResult> for SimulationResult {
    type Error = SimError;

    fn try_from(raw: RawSimulationResult) -> SimResult<Self> {
        if let Some(g) = raw.groups.iter().find(|g| g.len() != raw.n_periods) {
            return Err(SimError::Serialization(format!(
                "trajectory {:?} has {} periods, expected {}",
                g.name,
                g.len(),
                raw.n_periods
            )));
        }
        Ok(Self::new(raw.n_periods, raw.groups))
    }
}

impl SimulationResult {
    pub(crate) fn new(n_periods: usize, groups: Vec<GroupTrajectory>) -> Self {
        Self { n_periods, groups }
    }

    pub fn n_periods(&self) -> usize {
        self.n_periods
    }

    /// Look up a group's trajectory by name.
    pub fn group(&self, name: &str) -> Option<&GroupTrajectory> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// All trajectories in configuration order.
    pub fn groups(&self) -> &[GroupTrajectory] {
        &self.groups
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GroupTrajectory> {
        self.groups.iter()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<'a> IntoIterator for &'a SimulationResult {
    type Item = &'a GroupTrajectory;
    type IntoIter = std::slice::Iter<'a, GroupTrajectory>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Period-by-period simulator for a single group.
///
/// Holds the running totals so each period costs one draw, one addition
/// and one division. Call [`finish`](Self::finish) to obtain the trajectory.
#[derive(Debug, Clone)]
pub struct GroupSimulator<'a> {
    spec: GroupSpec<'a>,
    successes_per_period: Vec<u64>,
    cumulative_n_obs: Vec<u64>,
    cumulative_n_success: Vec<u64>,
    cumulative_success_rate: Vec<f64>,
    running_successes: u64,
}

impl<'a> GroupSimulator<'a> {
    pub fn new(spec: GroupSpec<'a>, capacity: usize) -> Self {
        Self {
            spec,
            successes_per_period: Vec::with_capacity(capacity),
            cumulative_n_obs: Vec::with_capacity(capacity),
            cumulative_n_success: Vec::with_capacity(capacity),
            cumulative_success_rate: Vec::with_capacity(capacity),
            running_successes: 0,
        }
    }

    /// Periods simulated so far.
    pub fn periods_done(&self) -> usize {
        self.successes_per_period.len()
    }

    /// Simulate the next period.
    pub fn step<S: OutcomeSource + ?Sized>(&mut self, source: &mut S) -> SimResult<PeriodOutcome> {
        let period = self.periods_done();
        let n_obs = self.spec.n_obs_per_period;

        let successes = source.draw(&self.spec, period)?;
        if successes > n_obs {
            return Err(SimError::InvalidOutcome {
                group: self.spec.name.to_string(),
                period,
                successes,
                n_obs,
            });
        }

        // Validated configs keep n_obs * n_periods within u64; stepping past
        // n_periods can still overflow.
        let cumulative_n_obs = (period as u64 + 1)
            .checked_mul(n_obs)
            .ok_or_else(|| self.overflow(period))?;
        self.running_successes = self
            .running_successes
            .checked_add(successes)
            .ok_or_else(|| self.overflow(period))?;
        // cumulative_n_obs >= n_obs >= 1
        let rate = self.running_successes as f64 / cumulative_n_obs as f64;

        self.successes_per_period.push(successes);
        self.cumulative_n_obs.push(cumulative_n_obs);
        self.cumulative_n_success.push(self.running_successes);
        self.cumulative_success_rate.push(rate);

        Ok(PeriodOutcome {
            period,
            successes,
            cumulative_n_obs,
            cumulative_n_success: self.running_successes,
            cumulative_success_rate: rate,
        })
    }

    fn overflow(&self, period: usize) -> SimError {
        SimError::configuration(
            &["n_obs_per_period", "n_periods"],
            format!(
                "cumulative observations of group {:?} overflow u64 at period {}",
                self.spec.name, period
            ),
        )
    }

    /// Seal the simulated periods into an immutable trajectory.
    pub fn finish(self) -> GroupTrajectory {
        GroupTrajectory {
            name: self.spec.name.to_string(),
            n_obs_per_period: self.spec.n_obs_per_period,
            true_success_rate: self.spec.true_success_rate,
            successes_per_period: self.successes_per_period,
            cumulative_n_obs: self.cumulative_n_obs,
            cumulative_n_success: self.cumulative_n_success,
            cumulative_success_rate: self.cumulative_success_rate,
        }
    }
}

/// Simulate all periods of one group.
pub fn simulate_group<S: OutcomeSource + ?Sized>(
    spec: GroupSpec<'_>,
    n_periods: usize,
    source: &mut S,
) -> SimResult<GroupTrajectory> {
    let mut sim = GroupSimulator::new(spec, n_periods);
    for _ in 0..n_periods {
        sim.step(source)?;
    }
    Ok(sim.finish())
}

/// Run a full simulation drawing outcomes from `source`.
///
/// The configuration is validated before the first draw. Groups are
/// simulated in configuration order, each consuming all its periods before
/// the next group starts.
pub fn run_with_source<S: OutcomeSource + ?Sized>(
    config: &ExperimentConfig,
    source: &mut S,
) -> SimResult<SimulationResult> {
    config.validate()?;

    let groups = config
        .groups()
        .map(|spec| simulate_group(spec, config.n_periods, &mut *source))
        .collect::<SimResult<Vec<_>>>()?;

    Ok(SimulationResult::new(config.n_periods, groups))
}

/// Run a full simulation with an injected random generator.
pub fn run<R: Rng + ?Sized>(config: &ExperimentConfig, rng: &mut R) -> SimResult<SimulationResult> {
    run_with_source(config, &mut RngSource::new(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn config(rates: Vec<f64>, n_obs: Vec<u64>, n_periods: usize) -> ExperimentConfig {
        let names = (0..rates.len()).map(|i| format!("G{}", i)).collect();
        ExperimentConfig::new(names, n_obs, rates, n_periods)
    }

    /// Always returns the same count, regardless of group.
    struct Constant(u64);

    impl OutcomeSource for Constant {
        fn draw(&mut self, _group: &GroupSpec<'_>, _period: usize) -> SimResult<u64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_degenerate_rates_scenario() {
        let config = ExperimentConfig::new(
            vec!["A".into(), "B".into()],
            vec![10, 10],
            vec![0.0, 1.0],
            3,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let result = run(&config, &mut rng).unwrap();

        let a = result.group("A").unwrap();
        assert_eq!(a.successes_per_period(), &[0, 0, 0]);
        assert_eq!(a.cumulative_n_success(), &[0, 0, 0]);
        assert_eq!(a.cumulative_n_obs(), &[10, 20, 30]);
        assert_eq!(a.cumulative_success_rate(), &[0.0, 0.0, 0.0]);

        let b = result.group("B").unwrap();
        assert_eq!(b.successes_per_period(), &[10, 10, 10]);
        assert_eq!(b.cumulative_n_success(), &[10, 20, 30]);
        assert_eq!(b.cumulative_n_obs(), &[10, 20, 30]);
        assert_eq!(b.cumulative_success_rate(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_prefix_sums_from_constant_source() {
        let config = config(vec![0.5], vec![4], 4);
        let result = run_with_source(&config, &mut Constant(3)).unwrap();
        let g = &result.groups()[0];
        assert_eq!(g.successes_per_period(), &[3, 3, 3, 3]);
        assert_eq!(g.cumulative_n_success(), &[3, 6, 9, 12]);
        assert_eq!(g.cumulative_n_obs(), &[4, 8, 12, 16]);
        assert_eq!(g.cumulative_success_rate(), &[0.75, 0.75, 0.75, 0.75]);
    }

    #[test]
    fn test_outcome_above_n_obs_rejected() {
        let config = config(vec![0.5], vec![4], 2);
        let err = run_with_source(&config, &mut Constant(5)).unwrap_err();
        assert_eq!(
            err,
            SimError::InvalidOutcome {
                group: "G0".into(),
                period: 0,
                successes: 5,
                n_obs: 4,
            }
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = config(vec![0.5, 0.5], vec![10], 3);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(run(&bad, &mut rng).unwrap_err().is_configuration());
    }

    #[test]
    fn test_result_preserves_config_order() {
        let config = ExperimentConfig::new(
            vec!["zeta".into(), "alpha".into(), "mid".into()],
            vec![5, 5, 5],
            vec![0.1, 0.2, 0.3],
            2,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let result = run(&config, &mut rng).unwrap();
        let names: Vec<_> = result.group_names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(result.len(), 3);
        assert_eq!(result.n_periods(), 2);
        assert!(result.group("missing").is_none());
    }

    #[test]
    fn test_same_seed_same_result() {
        let config = config(vec![0.3, 0.6], vec![100, 40], 25);
        let r1 = run(&config, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let r2 = run(&config, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn test_different_seeds_differ() {
        let config = config(vec![0.5], vec![1000], 10);
        let r1 = run(&config, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        let r2 = run(&config, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();
        assert_ne!(r1.groups()[0].successes_per_period(), r2.groups()[0].successes_per_period());
    }

    #[test]
    fn test_incremental_matches_whole_run() {
        let config = config(vec![0.4], vec![50], 12);
        let whole = run(&config, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();

        let spec = config.groups().next().unwrap();
        let mut source = RngSource::new(ChaCha8Rng::seed_from_u64(9));
        let mut sim = GroupSimulator::new(spec, config.n_periods);
        let mut last = None;
        for t in 0..config.n_periods {
            let outcome = sim.step(&mut source).unwrap();
            assert_eq!(outcome.period, t);
            assert_eq!(Some(outcome), whole.groups()[0].period(t));
            last = Some(outcome);
        }
        assert_eq!(sim.periods_done(), 12);
        assert_eq!(last, whole.groups()[0].last());
        assert_eq!(&sim.finish(), &whole.groups()[0]);
    }

    #[test]
    fn test_step_past_u64_range_is_error() {
        let names = vec!["A".to_string()];
        let spec = GroupSpec {
            index: 0,
            name: &names[0],
            n_obs_per_period: u64::MAX / 2,
            true_success_rate: 0.0,
        };
        let mut sim = GroupSimulator::new(spec, 3);
        let mut source = Constant(0);
        assert!(sim.step(&mut source).is_ok());
        assert!(sim.step(&mut source).is_ok());
        let err = sim.step(&mut source).unwrap_err();
        assert!(matches!(
            err,
            SimError::Configuration { ref arguments, .. } if arguments == &["n_obs_per_period", "n_periods"]
        ));
        assert_eq!(sim.periods_done(), 2);
    }

    #[test]
    fn test_deserialize_rejects_unequal_sequences() {
        let json = r#"{
            "name": "A",
            "n_obs_per_period": 10,
            "true_success_rate": 0.5,
            "successes_per_period": [1, 2, 3],
            "cumulative_n_obs": [10],
            "cumulative_n_success": [1, 3, 6],
            "cumulative_success_rate": [0.1, 0.15, 0.2]
        }"#;
        let err = serde_json::from_str::<GroupTrajectory>(json).unwrap_err();
        assert!(err.to_string().contains("unequal length"));
    }

    #[test]
    fn test_deserialize_rejects_wrong_period_count() {
        let config = config(vec![0.5], vec![10], 3);
        let result = run(&config, &mut ChaCha8Rng::seed_from_u64(4)).unwrap();
        let mut value = serde_json::to_value(&result).unwrap();
        value["n_periods"] = serde_json::json!(5);
        assert!(serde_json::from_value::<SimulationResult>(value).is_err());

        let json = serde_json::to_string(&result).unwrap();
        let parsed: SimulationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.n_periods(), 3);
        assert_eq!(parsed.groups()[0].cumulative_n_obs(), &[10, 20, 30]);
    }

    #[test]
    fn test_trajectory_accessors() {
        let config = config(vec![1.0], vec![7], 3);
        let result = run(&config, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        let g = &result.groups()[0];
        assert_eq!(g.name(), "G0");
        assert_eq!(g.n_obs_per_period(), 7);
        assert_eq!(g.true_success_rate(), 1.0);
        assert_eq!(g.len(), 3);
        assert!(!g.is_empty());
        assert!(g.period(3).is_none());
        assert_eq!(g.last().unwrap().cumulative_n_obs, 21);
    }
}
