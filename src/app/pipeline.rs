//! Shared workflows used by the CLI subcommands and the integration tests.
//!
//! Keeping these in one place avoids duplicating the core flow:
//!
//! - rates: prices + rules + reference rates -> asof join -> adjustment -> sort
//! - stdev: rolling input -> contiguity -> rolling std -> grid reindex
//!
//! Groups (currency pairs, securities) are independent, so the per-group work
//! is sharded with rayon and the results are concatenated and globally sorted
//! afterwards. Output order never depends on scheduling.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use chrono::TimeDelta;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::align::{AsofJoiner, ConversionTable, PriceConverter};
use crate::domain::{
    AdjustedPrice, ColumnSummary, DenseRow, DenseTable, FinalPrice, JoinedRow, Observation, PriceQuote,
    RatesConfig, RatesSummary, RollingStat, StdevConfig, StdevSummary,
};
use crate::error::{AppError, SeriesError};
use crate::io::ingest::{self, RollingInput};
use crate::series::SeriesStore;
use crate::stats::{ContiguityTracker, GridReindexer, GridSpec, RollingStatsEngine};

/// All computed outputs of one `tsa rates` run.
#[derive(Debug, Clone)]
pub struct RatesRun {
    pub rows: Vec<AdjustedPrice>,
    pub summary: RatesSummary,
}

/// All computed outputs of one `tsa stdev` run.
#[derive(Debug, Clone)]
pub struct StdevRun {
    pub table: DenseTable,
    pub summary: StdevSummary,
}

/// Read the three input tables and produce the adjusted-price table.
pub fn run_rates(config: &RatesConfig) -> Result<RatesRun, AppError> {
    let prices = ingest::read_prices(&config.prices_path)?;
    if prices.is_empty() {
        return Err(AppError::new(
            3,
            format!("No price rows in '{}'.", config.prices_path.display()),
        ));
    }
    let conversions = ConversionTable::from_rules(ingest::read_conversions(&config.conversions_path)?)?;
    let rates = ingest::read_reference_rates(&config.rates_path)?;

    info!(
        prices = prices.len(),
        groups = prices.key_count(),
        rules = conversions.len(),
        reference_rates = rates.len(),
        "loaded rates inputs"
    );

    Ok(adjust_prices(&prices, &conversions, &rates, config.tolerance)?)
}

/// Join every price group against its reference rates and adjust each row.
pub fn adjust_prices(
    prices: &SeriesStore<PriceQuote>,
    conversions: &ConversionTable,
    rates: &SeriesStore<Option<f64>>,
    tolerance: TimeDelta,
) -> Result<RatesRun, SeriesError> {
    let joiner = AsofJoiner::new(tolerance)?;
    let converter = PriceConverter;

    let shards: Vec<Vec<AdjustedPrice>> = prices
        .groups()
        .par_iter()
        .map(|&(group, left)| {
            let right = rates.get(group);
            let conversion = conversions.resolve(group).cloned();
            debug!(group, prices = left.len(), rates = right.len(), "joining group");

            joiner
                .join(left, right)
                .into_iter()
                .map(|(obs, matched)| {
                    let row = JoinedRow {
                        timestamp: obs.timestamp,
                        security_id: obs.value.security_id.clone(),
                        group_key: group.to_string(),
                        price: obs.value.price,
                        conversion: conversion.clone(),
                        mid_rate: matched.and_then(|r| r.value),
                    };
                    AdjustedPrice {
                        final_price: converter.classify(&row),
                        timestamp: row.timestamp,
                        security_id: row.security_id,
                        price: row.price,
                        group_key: row.group_key,
                    }
                })
                .collect()
        })
        .collect();

    let mut rows: Vec<AdjustedPrice> = shards.into_iter().flatten().collect();
    rows.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.security_id.cmp(&b.security_id))
            .then_with(|| cmp_nulls_last(a.final_price.value(), b.final_price.value()))
    });

    let mut summary = RatesSummary {
        rows: rows.len(),
        groups: prices.key_count(),
        ..RatesSummary::default()
    };
    for row in &rows {
        match row.final_price {
            FinalPrice::Passthrough(_) => summary.passthrough += 1,
            FinalPrice::Converted(_) => summary.converted += 1,
            FinalPrice::NoMatch => summary.no_match += 1,
            FinalPrice::UnmappedGroup => summary.unmapped_group += 1,
        }
    }
    info!(
        rows = summary.rows,
        converted = summary.converted,
        insufficient = summary.insufficient(),
        "adjusted prices"
    );

    Ok(RatesRun { rows, summary })
}

/// Read the rolling input and produce the dense statistic table.
pub fn run_stdev(config: &StdevConfig) -> Result<StdevRun, AppError> {
    let input = ingest::read_rolling_input(&config.input_path, &config.columns)?;
    if input.store.is_empty() {
        return Err(AppError::new(
            3,
            format!("No rows in '{}'.", config.input_path.display()),
        ));
    }
    info!(
        rows = input.store.len(),
        entities = input.store.key_count(),
        columns = ?input.columns,
        "loaded rolling input"
    );

    Ok(rolling_table(&input, config)?)
}

/// Rolling standard deviation per entity and column, reindexed onto the grid.
pub fn rolling_table(input: &RollingInput, config: &StdevConfig) -> Result<StdevRun, SeriesError> {
    let tracker = ContiguityTracker::new(config.timestep)?;
    let engine = RollingStatsEngine::new(config.window)?;

    let entities: BTreeSet<&str> = if config.entities.is_empty() {
        input.store.keys().collect()
    } else {
        config.entities.iter().map(String::as_str).collect()
    };

    let per_entity: Vec<(&str, Vec<Vec<RollingStat>>)> = input
        .store
        .groups()
        .into_par_iter()
        .filter(|(entity, _)| entities.contains(entity))
        .map(|(entity, rows)| {
            entity_stats(&tracker, &engine, entity, rows, input.columns.len()).map(|stats| (entity, stats))
        })
        .collect::<Result<_, SeriesError>>()?;

    let mut columns: Vec<HashMap<String, Vec<RollingStat>>> = vec![HashMap::new(); input.columns.len()];
    for (entity, stats) in per_entity {
        for (c, column_stats) in stats.into_iter().enumerate() {
            columns[c].insert(entity.to_string(), column_stats);
        }
    }

    let (start, end) = match (config.start, config.end, input.store.time_range()) {
        (Some(start), Some(end), _) => (start, end),
        (start, end, Some((first, last))) => (start.unwrap_or(first), end.unwrap_or(last)),
        (_, _, None) => {
            return Err(SeriesError::config("no timestamps available to derive the grid range"));
        }
    };
    let spec = GridSpec::new(start, end, config.step.unwrap_or(config.timestep))?;
    let reindexer = GridReindexer::new(spec);

    let grids: Vec<Vec<Option<f64>>> = columns
        .par_iter()
        .map(|stats| {
            reindexer
                .reindex(stats, entities.iter().copied())
                .into_iter()
                .map(|cell| cell.value)
                .collect()
        })
        .collect();

    // All columns share the grid and entity set, so cells line up positionally.
    let skeleton = reindexer.reindex(&HashMap::new(), entities.iter().copied());
    let rows: Vec<DenseRow> = skeleton
        .into_iter()
        .enumerate()
        .map(|(i, cell)| DenseRow {
            entity_id: cell.entity_id,
            timestamp: cell.timestamp,
            values: grids.iter().map(|g| g[i]).collect(),
        })
        .collect();

    let summary = StdevSummary {
        entities: entities.len(),
        input_rows: input.store.len(),
        window: engine.window(),
        columns: input
            .columns
            .iter()
            .enumerate()
            .map(|(c, name)| ColumnSummary {
                name: name.clone(),
                samples: columns[c].values().map(Vec::len).sum(),
                valid: columns[c].values().flatten().filter(|s| s.valid).count(),
                filled: grids[c].iter().filter(|v| v.is_some()).count(),
            })
            .collect(),
        grid_start: Some(spec.start),
        grid_end: Some(spec.end),
        grid_rows: rows.len(),
    };
    info!(entities = summary.entities, grid_rows = summary.grid_rows, "built rolling table");

    Ok(StdevRun {
        table: DenseTable {
            columns: input
                .columns
                .iter()
                .map(|c| format!("{c}{}", engine.suffix()))
                .collect(),
            rows,
        },
        summary,
    })
}

/// Rolling stats for one entity, one vector per value column.
///
/// Fully populated entities share one contiguity mask across columns; when
/// any cell is null each column is windowed over its own non-null samples, so
/// a missing value acts as a gap for that column only.
fn entity_stats(
    tracker: &ContiguityTracker,
    engine: &RollingStatsEngine,
    entity: &str,
    rows: &[Observation<Vec<Option<f64>>>],
    n_columns: usize,
) -> Result<Vec<Vec<RollingStat>>, SeriesError> {
    let dense = rows.iter().all(|o| o.value.iter().all(Option::is_some));

    if dense {
        let timestamps: Vec<_> = rows.iter().map(|o| o.timestamp).collect();
        let columns: Vec<Vec<f64>> = (0..n_columns)
            .map(|c| rows.iter().map(|o| o.value[c].unwrap_or(f64::NAN)).collect())
            .collect();
        let flags = tracker.mark(rows);
        return engine.rolling_columns(entity, &timestamps, &columns, &flags);
    }

    (0..n_columns)
        .map(|c| {
            let series: Vec<Observation<f64>> = rows
                .iter()
                .filter_map(|o| {
                    o.value[c].map(|v| Observation {
                        key: o.key.clone(),
                        timestamp: o.timestamp,
                        value: v,
                    })
                })
                .collect();
            let flags = tracker.mark(&series);
            engine.rolling(&series, &flags)
        })
        .collect()
}

fn cmp_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::path::PathBuf;

    use crate::domain::{Conversion, ConversionRule};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 11, 20).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn quote(group: &str, t: NaiveDateTime, security: &str, price: f64) -> Observation<PriceQuote> {
        Observation::new(
            group,
            t,
            PriceQuote {
                security_id: security.to_string(),
                price: Some(price),
            },
        )
    }

    fn stdev_config(window: usize) -> StdevConfig {
        StdevConfig {
            input_path: PathBuf::from("unused.csv"),
            window,
            timestep: TimeDelta::hours(1),
            step: None,
            start: None,
            end: None,
            entities: Vec::new(),
            columns: Vec::new(),
            output: None,
            summary_json: None,
        }
    }

    fn rolling_input(columns: &[&str], rows: Vec<Observation<Vec<Option<f64>>>>) -> RollingInput {
        RollingInput {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            store: SeriesStore::from_observations(rows),
        }
    }

    #[test]
    fn adjusts_and_sorts_prices() {
        let prices = SeriesStore::from_observations(vec![
            quote("USDJPY", at(1, 0), "S2", 50.0),
            quote("EURUSD", at(1, 0), "S1", 1.1),
            quote("USDJPY", at(0, 30), "S3", 20.0),
            quote("GBPUSD", at(0, 30), "S0", 3.0),
        ]);
        let conversions = ConversionTable::from_rules(vec![
            ConversionRule {
                group_key: "EURUSD".to_string(),
                convert_flag: Some(false),
                conversion_factor: None,
            },
            ConversionRule {
                group_key: "USDJPY".to_string(),
                convert_flag: Some(true),
                conversion_factor: Some(100.0),
            },
        ])
        .unwrap();
        let rates = SeriesStore::from_observations(vec![Observation::new("USDJPY", at(0, 45), Some(1.0))]);

        let run = adjust_prices(&prices, &conversions, &rates, TimeDelta::hours(1)).unwrap();
        let keys: Vec<(&str, Option<f64>)> =
            run.rows.iter().map(|r| (r.security_id.as_str(), r.final_price.value())).collect();

        assert_eq!(
            keys,
            vec![("S0", None), ("S3", None), ("S1", Some(1.1)), ("S2", Some(1.5))]
        );
        assert_eq!(run.rows[0].final_price, FinalPrice::UnmappedGroup);
        assert_eq!(run.rows[1].final_price, FinalPrice::NoMatch);
        assert_eq!(run.summary.passthrough, 1);
        assert_eq!(run.summary.converted, 1);
        assert_eq!(run.summary.insufficient(), 2);
        assert_eq!(run.summary.groups, 3);
    }

    #[test]
    fn equal_keys_order_by_final_price_with_nulls_last() {
        let prices = SeriesStore::from_observations(vec![
            quote("USDJPY", at(1, 0), "S1", 300.0),
            quote("USDJPY", at(1, 0), "S1", 100.0),
            quote("AUDUSD", at(1, 0), "S1", 1.0),
        ]);
        let conversions = ConversionTable::from_rules(vec![ConversionRule {
            group_key: "USDJPY".to_string(),
            convert_flag: Some(false),
            conversion_factor: None,
        }])
        .unwrap();

        let run = adjust_prices(&prices, &conversions, &SeriesStore::default(), TimeDelta::hours(1)).unwrap();
        let values: Vec<Option<f64>> = run.rows.iter().map(|r| r.final_price.value()).collect();
        assert_eq!(values, vec![Some(100.0), Some(300.0), None]);
        assert!(matches!(conversions.resolve("USDJPY"), Some(Conversion::Passthrough)));
    }

    #[test]
    fn hourly_stdev_is_reindexed_with_forward_fill() {
        let rows = vec![
            Observation::new("A", at(0, 0), vec![Some(10.0)]),
            Observation::new("A", at(1, 0), vec![Some(10.0)]),
            Observation::new("A", at(2, 0), vec![Some(30.0)]),
        ];
        let mut config = stdev_config(2);
        config.end = Some(at(4, 0));

        let run = rolling_table(&rolling_input(&["price"], rows), &config).unwrap();
        assert_eq!(run.table.columns, vec!["price_std"]);

        let values: Vec<Option<f64>> = run.table.rows.iter().map(|r| r.values[0]).collect();
        assert_eq!(values.len(), 5);
        assert_eq!(values[0], None);
        assert_eq!(values[1], Some(0.0));
        assert!((values[2].unwrap() - 14.142135623730951).abs() < 1e-9);
        assert_eq!(values[3], values[2]);
        assert_eq!(values[4], values[2]);
        assert_eq!(run.summary.columns[0].valid, 2);
        assert_eq!(run.summary.columns[0].filled, 4);
    }

    #[test]
    fn null_cells_gap_only_their_own_column() {
        let rows = vec![
            Observation::new("A", at(0, 0), vec![Some(1.0), Some(1.0)]),
            Observation::new("A", at(1, 0), vec![None, Some(3.0)]),
            Observation::new("A", at(2, 0), vec![Some(5.0), Some(5.0)]),
        ];
        let run = rolling_table(&rolling_input(&["bid", "ask"], rows), &stdev_config(2)).unwrap();

        let last = &run.table.rows[2];
        assert_eq!(last.timestamp, at(2, 0));
        // bid skips 01:00, so its only window spans a two hour gap.
        assert_eq!(last.values[0], None);
        assert!((last.values[1].unwrap() - 2.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn entity_filter_keeps_unknown_entities_as_null_rows() {
        let rows = vec![
            Observation::new("A", at(0, 0), vec![Some(1.0)]),
            Observation::new("A", at(1, 0), vec![Some(2.0)]),
            Observation::new("B", at(0, 0), vec![Some(4.0)]),
            Observation::new("B", at(1, 0), vec![Some(8.0)]),
        ];
        let mut config = stdev_config(2);
        config.entities = vec!["B".to_string(), "Z".to_string()];

        let run = rolling_table(&rolling_input(&["px"], rows), &config).unwrap();
        let ids: Vec<&str> = run.table.rows.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "Z", "B", "Z"]);
        assert!((run.table.rows[2].values[0].unwrap() - 8.0_f64.sqrt()).abs() < 1e-9);
        assert_eq!(run.table.rows[3].values[0], None);
    }

    #[test]
    fn rejects_invalid_window() {
        let rows = vec![Observation::new("A", at(0, 0), vec![Some(1.0)])];
        let err = rolling_table(&rolling_input(&["px"], rows), &stdev_config(1)).unwrap_err();
        assert!(matches!(err, SeriesError::InvalidConfig(_)));
    }
}
