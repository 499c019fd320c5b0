//! Read-only playback over a finished run
//!
//! A renderer reveals the cumulative curves one period at a time. Frame `t`
//! exposes the prefix `[0..=t]` of every group's precomputed sequences as
//! borrowed slices; nothing is recomputed or copied.

use crate::engine::{GroupTrajectory, SimulationResult};

/// One group's revealed data at a given frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupFrame<'a> {
    pub name: &'a str,
    /// Reference line for the observed rate
    pub true_success_rate: f64,
    pub cumulative_n_obs: &'a [u64],
    pub cumulative_n_success: &'a [u64],
    pub cumulative_success_rate: &'a [f64],
}

impl<'a> GroupFrame<'a> {
    fn reveal(trajectory: &'a GroupTrajectory, frame: usize) -> Self {
        let end = frame + 1;
        Self {
            name: trajectory.name(),
            true_success_rate: trajectory.true_success_rate(),
            cumulative_n_obs: &trajectory.cumulative_n_obs()[..end],
            cumulative_n_success: &trajectory.cumulative_n_success()[..end],
            cumulative_success_rate: &trajectory.cumulative_success_rate()[..end],
        }
    }

    /// Most recently revealed observed rate.
    pub fn current_rate(&self) -> f64 {
        self.cumulative_success_rate.last().copied().unwrap_or_default()
    }
}

/// All groups at one frame, in configuration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'a> {
    pub index: usize,
    pub groups: Vec<GroupFrame<'a>>,
}

/// Frame cursor over a [`SimulationResult`].
#[derive(Debug, Clone, Copy)]
pub struct Playback<'a> {
    result: &'a SimulationResult,
}

impl<'a> Playback<'a> {
    pub fn new(result: &'a SimulationResult) -> Self {
        Self { result }
    }

    /// One frame per simulated period.
    pub fn frame_count(&self) -> usize {
        self.result.n_periods()
    }

    pub fn frame(&self, index: usize) -> Option<Frame<'a>> {
        if index >= self.frame_count() {
            return None;
        }
        Some(self.frame_unchecked(index))
    }

    /// Iterate every frame in order.
    pub fn frames(&self) -> impl Iterator<Item = Frame<'a>> + 'a {
        let playback = *self;
        (0..self.frame_count()).map(move |t| playback.frame_unchecked(t))
    }

    /// Caller guarantees `index < frame_count()`; every trajectory spans
    /// `n_periods` entries.
    fn frame_unchecked(&self, index: usize) -> Frame<'a> {
        let result: &'a SimulationResult = self.result;
        let groups = result
            .iter()
            .map(|trajectory| GroupFrame::reveal(trajectory, index))
            .collect();
        Frame { index, groups }
    }
}
