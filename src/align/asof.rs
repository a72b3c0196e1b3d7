//! Backward asof join with a staleness bound.
//!
//! For every left observation at time `t` we pick the latest right
//! observation at or before `t`, and keep it only if it is at most
//! `tolerance` old. Both sides must already be sorted ascending by timestamp
//! (as `SeriesStore` guarantees), which lets the join run as a single forward
//! pass with one cursor into the right side.

use chrono::TimeDelta;

use crate::domain::Observation;
use crate::error::SeriesError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsofJoiner {
    tolerance: TimeDelta,
}

impl AsofJoiner {
    pub fn new(tolerance: TimeDelta) -> Result<Self, SeriesError> {
        if tolerance < TimeDelta::zero() {
            return Err(SeriesError::config(format!(
                "asof tolerance must not be negative (got {tolerance})"
            )));
        }
        Ok(Self { tolerance })
    }

    pub fn tolerance(&self) -> TimeDelta {
        self.tolerance
    }

    /// Join one group's left series against the same group's right series.
    ///
    /// Returns one pair per left element, in left order. When several right
    /// elements share the matched timestamp the last one wins.
    pub fn join<'l, 'r, L, R>(
        &self,
        left: &'l [Observation<L>],
        right: &'r [Observation<R>],
    ) -> Vec<(&'l Observation<L>, Option<&'r Observation<R>>)> {
        let mut out = Vec::with_capacity(left.len());
        // Number of right elements with timestamp <= the current left timestamp.
        let mut cursor = 0usize;

        for l in left {
            while cursor < right.len() && right[cursor].timestamp <= l.timestamp {
                cursor += 1;
            }
            let matched = cursor
                .checked_sub(1)
                .map(|idx| &right[idx])
                .filter(|r| l.timestamp - r.timestamp <= self.tolerance);
            out.push((l, matched));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn obs<V>(t: NaiveDateTime, v: V) -> Observation<V> {
        Observation::new("EURUSD", t, v)
    }

    fn joiner() -> AsofJoiner {
        AsofJoiner::new(TimeDelta::hours(1)).unwrap()
    }

    #[test]
    fn picks_latest_prior_rate() {
        let left = vec![obs(ts(1, 30, 0), "a"), obs(ts(2, 10, 0), "b")];
        let right = vec![obs(ts(1, 0, 0), 1.0), obs(ts(1, 20, 0), 2.0), obs(ts(2, 0, 0), 3.0)];

        let joined = joiner().join(&left, &right);
        let matched: Vec<Option<f64>> = joined.iter().map(|(_, r)| r.map(|r| r.value)).collect();
        assert_eq!(matched, vec![Some(2.0), Some(3.0)]);
    }

    #[test]
    fn never_matches_a_future_rate() {
        let left = vec![obs(ts(0, 59, 59), "a")];
        let right = vec![obs(ts(1, 0, 0), 1.0)];
        let joined = joiner().join(&left, &right);
        assert!(joined[0].1.is_none());

        let left: Vec<_> = (0..24).map(|h| obs(ts(h, 17, 0), h)).collect();
        let right: Vec<_> = (0..24).map(|h| obs(ts(h, 31, 0), h as f64)).collect();
        for (l, r) in joiner().join(&left, &right) {
            if let Some(r) = r {
                assert!(r.timestamp <= l.timestamp);
            }
        }
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let right = vec![obs(ts(1, 0, 0), 1.0)];

        let exactly = vec![obs(ts(2, 0, 0), "a")];
        assert!(joiner().join(&exactly, &right)[0].1.is_some());

        let one_past = vec![obs(ts(2, 0, 1), "a")];
        assert!(joiner().join(&one_past, &right)[0].1.is_none());
    }

    #[test]
    fn zero_duration_tie_matches() {
        let left = vec![obs(ts(3, 0, 0), "a")];
        let right = vec![obs(ts(3, 0, 0), 7.0)];
        let zero = AsofJoiner::new(TimeDelta::zero()).unwrap();
        assert_eq!(zero.join(&left, &right)[0].1.map(|r| r.value), Some(7.0));
    }

    #[test]
    fn duplicate_right_timestamps_take_the_last() {
        let left = vec![obs(ts(3, 0, 0), "a")];
        let right = vec![obs(ts(2, 0, 0), 1.0), obs(ts(2, 0, 0), 2.0)];
        assert_eq!(joiner().join(&left, &right)[0].1.map(|r| r.value), Some(2.0));
    }

    #[test]
    fn empty_right_side_yields_no_matches() {
        let left = vec![obs(ts(1, 0, 0), "a"), obs(ts(2, 0, 0), "b")];
        let right: Vec<Observation<f64>> = Vec::new();
        let joined = joiner().join(&left, &right);
        assert_eq!(joined.len(), 2);
        assert!(joined.iter().all(|(_, r)| r.is_none()));
    }

    #[test]
    fn stale_rate_is_dropped_but_later_fresh_one_is_used() {
        let left = vec![obs(ts(5, 0, 0), "stale"), obs(ts(6, 30, 0), "fresh")];
        let right = vec![obs(ts(1, 0, 0), 1.0), obs(ts(6, 0, 0), 2.0)];
        let joined = joiner().join(&left, &right);
        assert!(joined[0].1.is_none());
        assert_eq!(joined[1].1.map(|r| r.value), Some(2.0));
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        assert!(matches!(
            AsofJoiner::new(TimeDelta::seconds(-1)),
            Err(SeriesError::InvalidConfig(_))
        ));
    }
}
