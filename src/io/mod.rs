//! Input/output helpers.
//!
//! - CSV ingest for prices, conversions, reference rates and rolling input (`ingest`)
//! - CSV exports for the output tables and JSON run summaries (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
