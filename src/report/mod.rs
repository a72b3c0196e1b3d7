//! Reporting utilities: plain-text run summaries.

pub mod format;

pub use format::{format_rates_summary, format_stdev_summary};
