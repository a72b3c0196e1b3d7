//! Contiguity marking.
//!
//! A sample "continues" its predecessor only when the two are exactly one
//! expected step apart. There is no tolerance here: a window is certified
//! gap-free or it is not.

use chrono::{NaiveDateTime, TimeDelta};

use crate::domain::Observation;
use crate::error::SeriesError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContiguityTracker {
    expected_step: TimeDelta,
}

impl ContiguityTracker {
    pub fn new(expected_step: TimeDelta) -> Result<Self, SeriesError> {
        if expected_step <= TimeDelta::zero() {
            return Err(SeriesError::config(format!(
                "timestep must be positive (got {expected_step})"
            )));
        }
        Ok(Self { expected_step })
    }

    pub fn expected_step(&self) -> TimeDelta {
        self.expected_step
    }

    /// One flag per observation; the first is always `false`.
    pub fn mark<V>(&self, series: &[Observation<V>]) -> Vec<bool> {
        self.mark_timestamps(series.iter().map(|o| o.timestamp))
    }

    pub fn mark_timestamps(&self, timestamps: impl IntoIterator<Item = NaiveDateTime>) -> Vec<bool> {
        let mut prev: Option<NaiveDateTime> = None;
        timestamps
            .into_iter()
            .map(|ts| {
                let flag = prev.is_some_and(|p| ts - p == self.expected_step);
                prev = Some(ts);
                flag
            })
            .collect()
    }
}
