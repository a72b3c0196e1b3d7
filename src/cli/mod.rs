//! Command-line parsing for the alignment/rolling-stat batch tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! alignment and windowing code. Every option can also be supplied through a
//! `TSA_*` environment variable (a `.env` file is loaded first).

use std::path::PathBuf;

use chrono::{NaiveDateTime, TimeDelta};
use clap::{Args, Parser, Subcommand};

use crate::series::parse_timestamp;

pub mod duration;

pub use duration::parse_duration;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tsa", version, about = "Asof price adjustment and contiguity-gated rolling statistics")]
pub struct Cli {
    /// Rayon worker threads (defaults to one per core).
    #[arg(long, global = true, env = "TSA_THREADS")]
    pub threads: Option<usize>,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, env = "TSA_QUIET")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Join prices to the latest reference rate within tolerance and apply conversions.
    Rates(RatesArgs),
    /// Rolling standard deviation over contiguous windows, reindexed onto a dense grid.
    Stdev(StdevArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RatesArgs {
    /// Price table CSV (`timestamp, security_id, price, ccy_pair`).
    #[arg(long, env = "TSA_PRICES", value_name = "CSV")]
    pub prices: PathBuf,

    /// Conversion table CSV (`ccy_pair, convert_price, conversion_factor`).
    #[arg(long, env = "TSA_CONVERSIONS", value_name = "CSV")]
    pub conversions: PathBuf,

    /// Reference-rate CSV (`timestamp, ccy_pair, spot_mid_rate`).
    #[arg(long, env = "TSA_RATES", value_name = "CSV")]
    pub rates: PathBuf,

    /// Maximum age of a matched reference rate (e.g. `1h`, `30m`).
    #[arg(long, env = "TSA_TOLERANCE", default_value = "1h", value_parser = parse_duration)]
    pub tolerance: TimeDelta,

    /// Output CSV (stdout when omitted).
    #[arg(short, long, env = "TSA_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Write a JSON run summary.
    #[arg(long = "summary-json", env = "TSA_SUMMARY_JSON")]
    pub summary_json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct StdevArgs {
    /// Rolling input CSV (`security_id, snap_time, <value columns...>`).
    #[arg(long, env = "TSA_INPUT", value_name = "CSV")]
    pub input: PathBuf,

    /// Rolling window size (samples, at least 2).
    #[arg(short, long, env = "TSA_WINDOW", default_value_t = 20)]
    pub window: usize,

    /// Expected spacing between consecutive samples.
    #[arg(long, env = "TSA_TIMESTEP", default_value = "1h", value_parser = parse_duration)]
    pub timestep: TimeDelta,

    /// Output grid step (defaults to the timestep).
    #[arg(long, env = "TSA_STEP", value_parser = parse_duration)]
    pub step: Option<TimeDelta>,

    /// First grid timestamp (defaults to the earliest sample).
    #[arg(long, env = "TSA_START", value_parser = parse_timestamp)]
    pub start: Option<NaiveDateTime>,

    /// Last grid timestamp (defaults to the latest sample).
    #[arg(long, env = "TSA_END", value_parser = parse_timestamp)]
    pub end: Option<NaiveDateTime>,

    /// Restrict output to these securities (repeatable or comma-separated).
    #[arg(long = "security-id", env = "TSA_SECURITY_ID", value_name = "ID", value_delimiter = ',')]
    pub security_ids: Vec<String>,

    /// Value columns to process (repeatable or comma-separated; defaults to every non-key column).
    #[arg(long = "column", env = "TSA_COLUMN", value_name = "NAME", value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Output CSV (stdout when omitted).
    #[arg(short, long, env = "TSA_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Write a JSON run summary.
    #[arg(long = "summary-json", env = "TSA_SUMMARY_JSON")]
    pub summary_json: Option<PathBuf>,
}
