//! `ts-align` library crate.
//!
//! The binary (`tsa`) is a thin wrapper around this library so that:
//!
//! - the alignment and windowing core is testable without spawning processes
//! - the core can be reused from other batch jobs without the CSV boundary

pub mod align;
pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod report;
pub mod series;
pub mod stats;
