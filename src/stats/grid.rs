//! Dense fixed-step grid with per-entity forward fill.
//!
//! Every requested entity gets one cell per grid timestamp. A cell holds the
//! most recent *valid* statistic at or before its timestamp (an exact hit is
//! just the zero-distance case); before an entity's first valid statistic the
//! cell stays null. Fill never crosses from one entity to another.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDateTime, TimeDelta};

use crate::domain::{GridCell, RollingStat};
use crate::error::SeriesError;

/// Upper bound on timestamps in one grid.
pub const MAX_GRID_POINTS: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub step: TimeDelta,
}

impl GridSpec {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, step: TimeDelta) -> Result<Self, SeriesError> {
        if step <= TimeDelta::zero() {
            return Err(SeriesError::config(format!("grid step must be positive (got {step})")));
        }
        if start > end {
            return Err(SeriesError::config(format!("grid start {start} is after end {end}")));
        }
        match point_count(start, end, step) {
            Some(n) if n <= MAX_GRID_POINTS => Ok(Self { start, end, step }),
            _ => Err(SeriesError::config(format!(
                "grid {start}..{end} at step {step} exceeds {MAX_GRID_POINTS} timestamps"
            ))),
        }
    }

    /// `start, start + step, ...` up to and including `end` when it lands on the grid.
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        let mut out = Vec::new();
        let mut t = self.start;
        while t <= self.end {
            out.push(t);
            match t.checked_add_signed(self.step) {
                Some(next) => t = next,
                None => break,
            }
        }
        out
    }
}

fn point_count(start: NaiveDateTime, end: NaiveDateTime, step: TimeDelta) -> Option<i64> {
    let span = (end - start).num_microseconds()?;
    let step = step.num_microseconds()?.max(1);
    Some(span / step + 1)
}

#[derive(Debug, Clone, Copy)]
pub struct GridReindexer {
    spec: GridSpec,
}

impl GridReindexer {
    pub fn new(spec: GridSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Reindex per-entity statistics onto the grid.
    ///
    /// Output is sorted by `(timestamp, entity_id)`. Duplicate entity names
    /// are collapsed; entities without statistics produce null cells.
    pub fn reindex<'a>(
        &self,
        stats: &HashMap<String, Vec<RollingStat>>,
        entities: impl IntoIterator<Item = &'a str>,
    ) -> Vec<GridCell> {
        let grid = self.spec.timestamps();
        let entities: BTreeSet<&str> = entities.into_iter().collect();

        let filled: Vec<(&str, Vec<Option<f64>>)> = entities
            .iter()
            .map(|&entity| {
                let series = stats.get(entity).map(Vec::as_slice).unwrap_or(&[]);
                (entity, forward_fill(&grid, series))
            })
            .collect();

        let mut out = Vec::with_capacity(grid.len() * filled.len());
        for (g, &timestamp) in grid.iter().enumerate() {
            for (entity, values) in &filled {
                out.push(GridCell {
                    entity_id: (*entity).to_string(),
                    timestamp,
                    value: values[g],
                });
            }
        }
        out
    }
}

fn forward_fill(grid: &[NaiveDateTime], stats: &[RollingStat]) -> Vec<Option<f64>> {
    let mut valid: Vec<(NaiveDateTime, f64)> = stats
        .iter()
        .filter(|s| s.valid)
        .filter_map(|s| s.value.map(|v| (s.timestamp, v)))
        .collect();
    valid.sort_by_key(|(t, _)| *t);

    let mut cursor = 0usize;
    let mut last: Option<f64> = None;
    grid.iter()
        .map(|&t| {
            while cursor < valid.len() && valid[cursor].0 <= t {
                last = Some(valid[cursor].1);
                cursor += 1;
            }
            last
        })
        .collect()
}
