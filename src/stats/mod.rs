//! Windowed statistics: contiguity, rolling reducers, dense reindexing.

pub mod contiguity;
pub mod grid;
pub mod rolling;

pub use contiguity::ContiguityTracker;
pub use grid::{GridReindexer, GridSpec};
pub use rolling::{Reducer, RollingStatsEngine, SampleStdDev};
