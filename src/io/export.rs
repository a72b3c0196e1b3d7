//! Output tables (CSV) and run summaries (JSON).
//!
//! Every requested row is written; nulls are explicit (`insufficient data` for
//! prices, an empty cell for rolling statistics) rather than omitted.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{AdjustedPrice, DenseTable};
use crate::error::AppError;
use crate::series::format_timestamp;

/// Sentinel written in place of a null final price.
pub const INSUFFICIENT_DATA: &str = "insufficient data";

/// Write the adjusted-price table to `path`, or stdout when `None`.
pub fn write_adjusted_prices_csv(path: Option<&Path>, rows: &[AdjustedPrice]) -> Result<(), AppError> {
    match path {
        Some(path) => write_adjusted_prices(create(path)?, rows),
        None => write_adjusted_prices(std::io::stdout().lock(), rows),
    }
}

/// Write the dense rolling-statistic table to `path`, or stdout when `None`.
pub fn write_dense_table_csv(path: Option<&Path>, table: &DenseTable) -> Result<(), AppError> {
    match path {
        Some(path) => write_dense_table(create(path)?, table),
        None => write_dense_table(std::io::stdout().lock(), table),
    }
}

pub fn write_adjusted_prices<W: Write>(out: W, rows: &[AdjustedPrice]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(["timestamp", "security_id", "price", "ccy_pair", "final_price"])
        .map_err(write_err)?;

    for row in rows {
        let final_price = row
            .final_price
            .value()
            .map(format_float)
            .unwrap_or_else(|| INSUFFICIENT_DATA.to_string());
        writer
            .write_record([
                format_timestamp(&row.timestamp),
                row.security_id.clone(),
                row.price.map(format_float).unwrap_or_default(),
                row.group_key.clone(),
                final_price,
            ])
            .map_err(write_err)?;
    }

    writer.flush().map_err(|e| AppError::new(2, format!("Failed to flush CSV output: {e}")))
}

pub fn write_dense_table<W: Write>(out: W, table: &DenseTable) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["security_id".to_string(), "snap_time".to_string()];
    header.extend(table.columns.iter().cloned());
    writer.write_record(&header).map_err(write_err)?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(2 + row.values.len());
        record.push(row.entity_id.clone());
        record.push(format_timestamp(&row.timestamp));
        record.extend(row.values.iter().map(|v| v.map(format_float).unwrap_or_default()));
        writer.write_record(&record).map_err(write_err)?;
    }

    writer.flush().map_err(|e| AppError::new(2, format!("Failed to flush CSV output: {e}")))
}

/// Write a run summary as pretty JSON.
pub fn write_summary_json<T: Serialize>(path: &Path, summary: &T) -> Result<(), AppError> {
    let file = create(path)?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))
}

/// Shortest representation that round-trips (`10.0`, `14.142135623730951`).
pub fn format_float(v: f64) -> String {
    format!("{v:?}")
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))
}

fn write_err(e: csv::Error) -> AppError {
    AppError::new(2, format!("Failed to write CSV row: {e}"))
}
