//! Contiguity-gated rolling statistics.
//!
//! For the window ending at position `i` (covering `[i-W+1, i]`) the reducer's
//! output is reported only when:
//!
//! 1. at least `W` samples exist (`i >= W-1`), and
//! 2. every step transition inside the window is contiguous, i.e. all flags in
//!    `(i-W+1, i]` are true.
//!
//! Anything else is `valid = false` with a null value, even if the number
//! itself would be computable.

use chrono::NaiveDateTime;

use crate::domain::{Observation, RollingStat};
use crate::error::SeriesError;

/// A window reducer.
pub trait Reducer: Send + Sync {
    /// Smallest window the reducer is defined for.
    fn min_window(&self) -> usize {
        1
    }

    /// Reduce one full window. `None` means undefined for this window.
    fn reduce(&self, window: &[f64]) -> Option<f64>;

    /// Suffix appended to the source column name in output tables.
    fn suffix(&self) -> &'static str;
}

/// Sample standard deviation (denominator `n - 1`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleStdDev;

impl Reducer for SampleStdDev {
    fn min_window(&self) -> usize {
        2
    }

    fn reduce(&self, window: &[f64]) -> Option<f64> {
        let n = window.len();
        if n < 2 {
            return None;
        }
        let mean = window.iter().sum::<f64>() / n as f64;
        let ss: f64 = window.iter().map(|v| (v - mean) * (v - mean)).sum();
        let sd = (ss / (n as f64 - 1.0)).sqrt();
        sd.is_finite().then_some(sd)
    }

    fn suffix(&self) -> &'static str {
        "_std"
    }
}

#[derive(Debug, Clone)]
pub struct RollingStatsEngine<R = SampleStdDev> {
    window: usize,
    reducer: R,
}

impl RollingStatsEngine<SampleStdDev> {
    pub fn new(window: usize) -> Result<Self, SeriesError> {
        Self::with_reducer(window, SampleStdDev)
    }
}

impl<R: Reducer> RollingStatsEngine<R> {
    pub fn with_reducer(window: usize, reducer: R) -> Result<Self, SeriesError> {
        let min = reducer.min_window().max(1);
        if window < min {
            return Err(SeriesError::config(format!(
                "window must be at least {min} (got {window})"
            )));
        }
        Ok(Self { window, reducer })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn suffix(&self) -> &'static str {
        self.reducer.suffix()
    }

    /// Per-position window validity derived from contiguity flags alone.
    pub fn validity(&self, contiguity: &[bool]) -> Vec<bool> {
        let w = self.window;
        // breaks[k] = number of broken transitions among flags[0..k]
        let mut breaks = Vec::with_capacity(contiguity.len() + 1);
        breaks.push(0usize);
        for &flag in contiguity {
            let last = breaks[breaks.len() - 1];
            breaks.push(last + usize::from(!flag));
        }

        (0..contiguity.len())
            .map(|i| i + 1 >= w && breaks[i + 1] == breaks[i + 2 - w])
            .collect()
    }

    /// Rolling statistic over one entity's ordered series.
    pub fn rolling(
        &self,
        series: &[Observation<f64>],
        contiguity: &[bool],
    ) -> Result<Vec<RollingStat>, SeriesError> {
        ensure_aligned(series.len(), contiguity.len())?;
        let Some(first) = series.first() else {
            return Ok(Vec::new());
        };

        let timestamps: Vec<NaiveDateTime> = series.iter().map(|o| o.timestamp).collect();
        let values: Vec<f64> = series.iter().map(|o| o.value).collect();
        let mask = self.validity(contiguity);
        Ok(self.apply(&first.key, &timestamps, &values, &mask))
    }

    /// Rolling statistic for several value columns sharing one timeline.
    ///
    /// The validity mask is computed once and applied to every column.
    pub fn rolling_columns(
        &self,
        entity_id: &str,
        timestamps: &[NaiveDateTime],
        columns: &[Vec<f64>],
        contiguity: &[bool],
    ) -> Result<Vec<Vec<RollingStat>>, SeriesError> {
        ensure_aligned(timestamps.len(), contiguity.len())?;
        for column in columns {
            ensure_aligned(timestamps.len(), column.len())?;
        }

        let mask = self.validity(contiguity);
        Ok(columns
            .iter()
            .map(|values| self.apply(entity_id, timestamps, values, &mask))
            .collect())
    }

    fn apply(&self, entity_id: &str, timestamps: &[NaiveDateTime], values: &[f64], mask: &[bool]) -> Vec<RollingStat> {
        let w = self.window;
        timestamps
            .iter()
            .enumerate()
            .map(|(i, &timestamp)| {
                let value = if mask[i] {
                    self.reducer.reduce(&values[i + 1 - w..=i])
                } else {
                    None
                };
                RollingStat {
                    entity_id: entity_id.to_string(),
                    timestamp,
                    value,
                    valid: value.is_some(),
                }
            })
            .collect()
    }
}

fn ensure_aligned(expected: usize, got: usize) -> Result<(), SeriesError> {
    if expected != got {
        return Err(SeriesError::malformed(
            "rolling input",
            format!("series has {expected} samples but {got} aligned entries were supplied"),
        ));
    }
    Ok(())
}
