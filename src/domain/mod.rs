//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - per-key observations (`Observation`, `PriceQuote`)
//! - conversion rules and their resolved form (`ConversionRule`, `Conversion`)
//! - join / adjustment outputs (`JoinedRow`, `FinalPrice`, `AdjustedPrice`)
//! - windowed outputs (`RollingStat`, `GridCell`, `DenseTable`)
//! - run configs and summaries

pub mod types;

pub use types::*;
