//! Shared domain types.
//!
//! These are the logical rows that flow between the ingest layer, the
//! alignment/windowing core and the exporters. They are plain data: every
//! computation returns new values rather than mutating these in place.

use std::path::PathBuf;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

/// A single timestamped sample belonging to exactly one series key.
///
/// The key is whatever the series is grouped by: a security id for rolling
/// statistics, a currency pair for the asof join.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<V> {
    pub key: String,
    pub timestamp: NaiveDateTime,
    pub value: V,
}

impl<V> Observation<V> {
    pub fn new(key: impl Into<String>, timestamp: NaiveDateTime, value: V) -> Self {
        Self {
            key: key.into(),
            timestamp,
            value,
        }
    }
}

/// One raw price row. Grouped by `ccy_pair` for the asof join.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub security_id: String,
    /// `None` when the source cell was empty; propagates to a null final price.
    pub price: Option<f64>,
}

/// A conversion table row as read from disk, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRule {
    pub group_key: String,
    pub convert_flag: Option<bool>,
    pub conversion_factor: Option<f64>,
}

/// How prices of one currency pair are turned into final prices.
///
/// Resolved once per group key from its [`ConversionRule`].
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    Passthrough,
    Convert { factor: f64, group_key: String },
}

/// A price row joined with its group's conversion and the matched mid rate.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub timestamp: NaiveDateTime,
    pub security_id: String,
    pub group_key: String,
    pub price: Option<f64>,
    /// `None` when the group has no usable conversion rule.
    pub conversion: Option<Conversion>,
    /// `None` when no reference rate lies within tolerance.
    pub mid_rate: Option<f64>,
}

/// Outcome of adjusting one joined row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FinalPrice {
    /// Passthrough rule; the raw price (possibly null) is kept as is.
    Passthrough(Option<f64>),
    Converted(f64),
    /// Convert rule, but no reference rate within tolerance (or a null price).
    NoMatch,
    /// No usable conversion rule for the row's group key.
    UnmappedGroup,
}

impl FinalPrice {
    pub fn value(&self) -> Option<f64> {
        match *self {
            FinalPrice::Passthrough(price) => price,
            FinalPrice::Converted(value) => Some(value),
            FinalPrice::NoMatch | FinalPrice::UnmappedGroup => None,
        }
    }
}

/// One output row of the adjusted-price table.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedPrice {
    pub timestamp: NaiveDateTime,
    pub security_id: String,
    pub price: Option<f64>,
    pub group_key: String,
    pub final_price: FinalPrice,
}

/// Windowed statistic at one sample position.
///
/// `value` is only `Some` when `valid` is true.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingStat {
    pub entity_id: String,
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
    pub valid: bool,
}

/// One cell of the dense, reindexed statistic table.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub entity_id: String,
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

/// Dense rolling-statistic table: one row per (entity, grid timestamp).
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTable {
    /// Output column names, e.g. `bid_std`.
    pub columns: Vec<String>,
    pub rows: Vec<DenseRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenseRow {
    pub entity_id: String,
    pub timestamp: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

/// Run configuration for the adjusted-price workflow.
#[derive(Debug, Clone)]
pub struct RatesConfig {
    pub prices_path: PathBuf,
    pub conversions_path: PathBuf,
    pub rates_path: PathBuf,
    pub tolerance: TimeDelta,
    pub output: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
}

/// Run configuration for the rolling-statistic workflow.
#[derive(Debug, Clone)]
pub struct StdevConfig {
    pub input_path: PathBuf,
    pub window: usize,
    pub timestep: TimeDelta,
    /// Grid step; the timestep when not given.
    pub step: Option<TimeDelta>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Entity filter. Empty means every entity in the data.
    pub entities: Vec<String>,
    /// Value column selection. Empty means every non-key column.
    pub columns: Vec<String>,
    pub output: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
}

/// Counters for one adjusted-price run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RatesSummary {
    pub rows: usize,
    pub groups: usize,
    pub passthrough: usize,
    pub converted: usize,
    pub no_match: usize,
    pub unmapped_group: usize,
}

impl RatesSummary {
    pub fn insufficient(&self) -> usize {
        self.no_match + self.unmapped_group
    }
}

/// Counters for one rolling-statistic run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StdevSummary {
    pub entities: usize,
    pub input_rows: usize,
    pub window: usize,
    pub columns: Vec<ColumnSummary>,
    pub grid_start: Option<NaiveDateTime>,
    pub grid_end: Option<NaiveDateTime>,
    pub grid_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    /// Positions with a non-null input value.
    pub samples: usize,
    /// Positions whose window was complete and contiguous.
    pub valid: usize,
    /// Grid cells holding a value after forward fill.
    pub filled: usize,
}
