//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - initialises logging and the rayon pool
//! - runs the requested pipeline
//! - writes the output table (file or stdout) and optional summaries

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RatesArgs, StdevArgs};
use crate::domain::{RatesConfig, StdevConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `tsa` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.quiet);
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| AppError::new(2, format!("Failed to configure {threads} worker threads: {e}")))?;
    }

    match cli.command {
        Command::Rates(args) => handle_rates(args),
        Command::Stdev(args) => handle_stdev(args),
    }
}

fn handle_rates(args: RatesArgs) -> Result<(), AppError> {
    let config = rates_config_from_args(&args);
    let run = pipeline::run_rates(&config)?;

    crate::io::export::write_adjusted_prices_csv(config.output.as_deref(), &run.rows)?;
    if let Some(path) = &config.output {
        info!(path = %path.display(), rows = run.rows.len(), "wrote adjusted prices");
        println!("{}", crate::report::format_rates_summary(&run.summary));
    }
    if let Some(path) = &config.summary_json {
        crate::io::export::write_summary_json(path, &run.summary)?;
    }

    Ok(())
}

fn handle_stdev(args: StdevArgs) -> Result<(), AppError> {
    let config = stdev_config_from_args(&args);
    let run = pipeline::run_stdev(&config)?;

    crate::io::export::write_dense_table_csv(config.output.as_deref(), &run.table)?;
    if let Some(path) = &config.output {
        info!(path = %path.display(), rows = run.table.rows.len(), "wrote rolling statistics");
        println!("{}", crate::report::format_stdev_summary(&run.summary));
    }
    if let Some(path) = &config.summary_json {
        crate::io::export::write_summary_json(path, &run.summary)?;
    }

    Ok(())
}

pub fn rates_config_from_args(args: &RatesArgs) -> RatesConfig {
    RatesConfig {
        prices_path: args.prices.clone(),
        conversions_path: args.conversions.clone(),
        rates_path: args.rates.clone(),
        tolerance: args.tolerance,
        output: args.output.clone(),
        summary_json: args.summary_json.clone(),
    }
}

pub fn stdev_config_from_args(args: &StdevArgs) -> StdevConfig {
    StdevConfig {
        input_path: args.input.clone(),
        window: args.window,
        timestep: args.timestep,
        step: args.step,
        start: args.start,
        end: args.end,
        entities: args.security_ids.clone(),
        columns: args.columns.clone(),
        output: args.output.clone(),
        summary_json: args.summary_json.clone(),
    }
}

/// Logs go to stderr so CSV written to stdout stays clean.
///
/// Filter precedence: `TSA_LOG`, then `RUST_LOG`, then `ts_align=info`
/// (`warn` with `--quiet`).
fn init_tracing(quiet: bool) {
    let default = if quiet { "ts_align=warn" } else { "ts_align=info" };
    let filter = EnvFilter::try_from_env("TSA_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be installed (e.g. when embedded); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
