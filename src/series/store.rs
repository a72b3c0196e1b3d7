//! Per-key ordered series.
//!
//! `SeriesStore` is the foundation every windowed or joined computation reads
//! from. It is built once from an unordered batch and is immutable afterwards;
//! each key's observations are sorted ascending by timestamp with ties kept in
//! input order.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::domain::Observation;
use crate::error::SeriesError;
use crate::series::timestamp::parse_timestamp;

/// An observation whose timestamp has not been parsed yet.
#[derive(Debug, Clone)]
pub struct RawRecord<V> {
    /// Where the record came from (e.g. `prices.csv:12`), used in errors.
    pub location: String,
    pub key: String,
    pub timestamp: String,
    pub value: V,
}

#[derive(Debug, Clone)]
pub struct SeriesStore<V> {
    series: BTreeMap<String, Vec<Observation<V>>>,
}

impl<V> Default for SeriesStore<V> {
    fn default() -> Self {
        Self {
            series: BTreeMap::new(),
        }
    }
}

impl<V> SeriesStore<V> {
    /// Build a store from already-typed observations.
    pub fn from_observations(observations: impl IntoIterator<Item = Observation<V>>) -> Self {
        let mut series: BTreeMap<String, Vec<Observation<V>>> = BTreeMap::new();
        for obs in observations {
            series.entry(obs.key.clone()).or_default().push(obs);
        }
        for rows in series.values_mut() {
            // Stable: equal timestamps keep their input order.
            rows.sort_by_key(|o| o.timestamp);
        }
        Self { series }
    }

    /// Build a store from raw records, failing on the first unparseable timestamp.
    pub fn parse(records: impl IntoIterator<Item = RawRecord<V>>) -> Result<Self, SeriesError> {
        let observations = records
            .into_iter()
            .map(|r| {
                let timestamp =
                    parse_timestamp(&r.timestamp).map_err(|msg| SeriesError::malformed(r.location, msg))?;
                Ok(Observation {
                    key: r.key,
                    timestamp,
                    value: r.value,
                })
            })
            .collect::<Result<Vec<_>, SeriesError>>()?;
        Ok(Self::from_observations(observations))
    }

    /// The ordered series for `key`; empty when the key is unknown.
    pub fn get(&self, key: &str) -> &[Observation<V>] {
        self.series.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.series.contains_key(key)
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// `(key, series)` pairs in key order, collected so callers can shard them.
    pub fn groups(&self) -> Vec<(&str, &[Observation<V>])> {
        self.series
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect()
    }

    pub fn key_count(&self) -> usize {
        self.series.len()
    }

    /// Total number of observations across all keys.
    pub fn len(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// Earliest and latest timestamp over every key.
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.series.values().filter_map(|s| s.first()).map(|o| o.timestamp).min()?;
        let last = self.series.values().filter_map(|s| s.last()).map(|o| o.timestamp).max()?;
        Some((first, last))
    }

    /// Derive a new store keeping only observations for which `f` yields a value.
    ///
    /// Ordering is preserved, so the result needs no re-sort.
    pub fn project<W>(&self, mut f: impl FnMut(&V) -> Option<W>) -> SeriesStore<W> {
        let series = self
            .series
            .iter()
            .map(|(key, rows)| {
                let projected = rows
                    .iter()
                    .filter_map(|o| {
                        f(&o.value).map(|value| Observation {
                            key: o.key.clone(),
                            timestamp: o.timestamp,
                            value,
                        })
                    })
                    .collect::<Vec<_>>();
                (key.clone(), projected)
            })
            .filter(|(_, rows)| !rows.is_empty())
            .collect();
        SeriesStore { series }
    }
}
