//! CSV ingest for the four logical input tables.
//!
//! This module turns CSV files into typed rows and `SeriesStore`s. It owns
//! the column contract (names + aliases) and cell parsing; no alignment or
//! windowing happens here.
//!
//! Any unparseable cell aborts the run.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{ConversionRule, PriceQuote};
use crate::error::{AppError, SeriesError};
use crate::series::{RawRecord, SeriesStore};

const SECURITY_ID: &[&str] = &["security_id", "entity_id"];
const GROUP_KEY: &[&str] = &["ccy_pair", "group_key"];
const TIMESTAMP: &[&str] = &["timestamp"];
const SNAP_TIME: &[&str] = &["snap_time", "timestamp"];
const PRICE: &[&str] = &["price"];
const CONVERT_FLAG: &[&str] = &["convert_price", "convert_prices", "convert_flag"];
const CONVERSION_FACTOR: &[&str] = &["conversion_factor"];
const MID_RATE: &[&str] = &["spot_mid_rate", "mid_rate"];

/// Rolling-statistic input: the resolved value columns and one row per sample.
///
/// Each observation's value holds one entry per column, in `columns` order.
#[derive(Debug, Clone)]
pub struct RollingInput {
    pub columns: Vec<String>,
    pub store: SeriesStore<Vec<Option<f64>>>,
}

pub fn read_prices(path: &Path) -> Result<SeriesStore<PriceQuote>, AppError> {
    Ok(read_prices_from(open(path)?, &source_name(path))?)
}

pub fn read_conversions(path: &Path) -> Result<Vec<ConversionRule>, AppError> {
    Ok(read_conversions_from(open(path)?, &source_name(path))?)
}

pub fn read_reference_rates(path: &Path) -> Result<SeriesStore<Option<f64>>, AppError> {
    Ok(read_reference_rates_from(open(path)?, &source_name(path))?)
}

pub fn read_rolling_input(path: &Path, columns: &[String]) -> Result<RollingInput, AppError> {
    Ok(read_rolling_input_from(open(path)?, &source_name(path), columns)?)
}

/// Price table: `timestamp, security_id, price, ccy_pair`, grouped by `ccy_pair`.
pub fn read_prices_from<R: Read>(reader: R, source: &str) -> Result<SeriesStore<PriceQuote>, SeriesError> {
    let mut table = Table::new(reader, source)?;
    let ts = table.require(TIMESTAMP)?;
    let security = table.require(SECURITY_ID)?;
    let price = table.require(PRICE)?;
    let group = table.require(GROUP_KEY)?;

    let mut records = Vec::new();
    table.for_each(|loc, rec| {
        records.push(RawRecord {
            key: required_cell(rec, group, GROUP_KEY[0], &loc)?.to_string(),
            timestamp: required_cell(rec, ts, TIMESTAMP[0], &loc)?.to_string(),
            value: PriceQuote {
                security_id: required_cell(rec, security, SECURITY_ID[0], &loc)?.to_string(),
                price: parse_opt_f64(cell(rec, price), &loc)?,
            },
            location: loc,
        });
        Ok(())
    })?;

    SeriesStore::parse(records)
}

/// Conversion table: `ccy_pair, convert_price, conversion_factor`.
pub fn read_conversions_from<R: Read>(reader: R, source: &str) -> Result<Vec<ConversionRule>, SeriesError> {
    let mut table = Table::new(reader, source)?;
    let group = table.require(GROUP_KEY)?;
    let flag = table.require(CONVERT_FLAG)?;
    let factor = table.require(CONVERSION_FACTOR)?;

    let mut rules = Vec::new();
    table.for_each(|loc, rec| {
        rules.push(ConversionRule {
            group_key: required_cell(rec, group, GROUP_KEY[0], &loc)?.to_string(),
            convert_flag: parse_opt_bool(cell(rec, flag), &loc)?,
            conversion_factor: parse_opt_f64(cell(rec, factor), &loc)?,
        });
        Ok(())
    })?;

    Ok(rules)
}

/// Reference-rate table: `timestamp, ccy_pair, spot_mid_rate`, grouped by `ccy_pair`.
///
/// A null mid rate is kept: it is still the latest quote for its timestamp.
pub fn read_reference_rates_from<R: Read>(reader: R, source: &str) -> Result<SeriesStore<Option<f64>>, SeriesError> {
    let mut table = Table::new(reader, source)?;
    let ts = table.require(TIMESTAMP)?;
    let group = table.require(GROUP_KEY)?;
    let mid = table.require(MID_RATE)?;

    let mut records = Vec::new();
    table.for_each(|loc, rec| {
        records.push(RawRecord {
            key: required_cell(rec, group, GROUP_KEY[0], &loc)?.to_string(),
            timestamp: required_cell(rec, ts, TIMESTAMP[0], &loc)?.to_string(),
            value: parse_opt_f64(cell(rec, mid), &loc)?,
            location: loc,
        });
        Ok(())
    })?;

    SeriesStore::parse(records)
}

/// Rolling input: `security_id, snap_time, <value columns...>`.
///
/// With an empty `selection` every non-key column is a value column, in
/// header order.
pub fn read_rolling_input_from<R: Read>(
    reader: R,
    source: &str,
    selection: &[String],
) -> Result<RollingInput, SeriesError> {
    let mut table = Table::new(reader, source)?;
    let security = table.require(SECURITY_ID)?;
    let ts = table.require(SNAP_TIME)?;

    let (columns, indices): (Vec<String>, Vec<usize>) = if selection.is_empty() {
        table
            .labels
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != security && *idx != ts)
            .map(|(idx, label)| (label.clone(), idx))
            .unzip()
    } else {
        selection
            .iter()
            .map(|name| {
                let key = normalize_header_name(name);
                let idx = table.require(&[key.as_str()])?;
                Ok::<_, SeriesError>((table.labels[idx].clone(), idx))
            })
            .collect::<Result<Vec<_>, SeriesError>>()?
            .into_iter()
            .unzip()
    };

    if columns.is_empty() {
        return Err(SeriesError::malformed(source, "no value columns besides the key and time columns"));
    }

    let mut records = Vec::new();
    table.for_each(|loc, rec| {
        let values = indices
            .iter()
            .map(|&idx| parse_opt_f64(cell(rec, idx), &loc))
            .collect::<Result<Vec<_>, _>>()?;
        records.push(RawRecord {
            key: required_cell(rec, security, SECURITY_ID[0], &loc)?.to_string(),
            timestamp: required_cell(rec, ts, SNAP_TIME[0], &loc)?.to_string(),
            value: values,
            location: loc,
        });
        Ok(())
    })?;

    Ok(RollingInput {
        columns,
        store: SeriesStore::parse(records)?,
    })
}

/// A CSV reader plus its resolved header.
///
/// `labels` keep the header text as written; lookups go through the
/// lowercased `header_map`.
struct Table<R> {
    source: String,
    reader: csv::Reader<R>,
    labels: Vec<String>,
    header_map: HashMap<String, usize>,
}

impl<R: Read> Table<R> {
    fn new(reader: R, source: &str) -> Result<Self, SeriesError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| SeriesError::malformed(source, format!("failed to read CSV headers: {e}")))?
            .clone();

        let labels: Vec<String> = headers.iter().map(|h| strip_header(h).to_string()).collect();
        let header_map = build_header_map(&headers);

        Ok(Self {
            source: source.to_string(),
            reader,
            labels,
            header_map,
        })
    }

    /// Index of the first alias present in the header.
    fn require(&self, aliases: &[&str]) -> Result<usize, SeriesError> {
        aliases
            .iter()
            .find_map(|name| self.header_map.get(*name).copied())
            .ok_or_else(|| {
                SeriesError::malformed(
                    &self.source,
                    format!("missing required column: `{}`", aliases.join("` or `")),
                )
            })
    }

    fn for_each(
        &mut self,
        mut f: impl FnMut(String, &StringRecord) -> Result<(), SeriesError>,
    ) -> Result<(), SeriesError> {
        for (idx, result) in self.reader.records().enumerate() {
            // records() starts after the header, and lines are 1-based.
            let loc = format!("{}:{}", self.source, idx + 2);
            let record = result.map_err(|e| SeriesError::malformed(&loc, format!("CSV parse error: {e}")))?;
            f(loc, &record)?;
        }
        Ok(())
    }
}

fn open(path: &Path) -> Result<File, AppError> {
    File::open(path).map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for duplicated headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn strip_header(name: &str) -> &str {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').trim()
}

fn normalize_header_name(name: &str) -> String {
    strip_header(name).to_ascii_lowercase()
}

fn cell(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !is_null_token(s))
}

fn required_cell<'a>(record: &'a StringRecord, idx: usize, name: &str, loc: &str) -> Result<&'a str, SeriesError> {
    cell(record, idx).ok_or_else(|| SeriesError::malformed(loc, format!("missing required value: `{name}`")))
}

fn is_null_token(s: &str) -> bool {
    matches!(s, "" | "NA" | "<NA>" | "null" | "NULL" | "None") || s.eq_ignore_ascii_case("nan")
}

fn parse_opt_f64(s: Option<&str>, loc: &str) -> Result<Option<f64>, SeriesError> {
    let Some(s) = s else { return Ok(None) };
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(SeriesError::malformed(loc, format!("invalid number '{s}'"))),
    }
}

fn parse_opt_bool(s: Option<&str>, loc: &str) -> Result<Option<bool>, SeriesError> {
    let Some(s) = s else { return Ok(None) };
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(Some(true)),
        "false" | "f" | "0" | "no" | "n" => Ok(Some(false)),
        _ => Err(SeriesError::malformed(loc, format!("invalid boolean '{s}'"))),
    }
}
