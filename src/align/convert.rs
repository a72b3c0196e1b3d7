//! Conversion rules and the per-row price adjustment.
//!
//! Rules are resolved once per currency pair into a [`Conversion`]; adjusting
//! a joined row is then a pure function of that resolution, the raw price and
//! the matched mid rate.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::domain::{Conversion, ConversionRule, FinalPrice, JoinedRow};
use crate::error::SeriesError;

/// Resolved conversion rules keyed by group key.
#[derive(Debug, Clone, Default)]
pub struct ConversionTable {
    rules: HashMap<String, Conversion>,
}

impl ConversionTable {
    /// Resolve raw rules.
    ///
    /// - flag `false` resolves to `Passthrough`
    /// - flag `true` or null with a factor resolves to `Convert`
    /// - flag `true` or null without a factor leaves the key unmapped
    ///
    /// A group key listed twice is rejected.
    pub fn from_rules(rules: impl IntoIterator<Item = ConversionRule>) -> Result<Self, SeriesError> {
        let mut resolved = HashMap::new();
        let mut seen = HashSet::new();

        for rule in rules {
            if !seen.insert(rule.group_key.clone()) {
                return Err(SeriesError::malformed(
                    "conversion table",
                    format!("duplicate rule for group key '{}'", rule.group_key),
                ));
            }

            let conversion = match (rule.convert_flag, rule.conversion_factor) {
                (Some(false), _) => Conversion::Passthrough,
                (_, Some(factor)) => Conversion::Convert {
                    factor,
                    group_key: rule.group_key.clone(),
                },
                (_, None) => {
                    warn!(group_key = %rule.group_key, "convert rule has no conversion factor; treating group as unmapped");
                    continue;
                }
            };
            resolved.insert(rule.group_key, conversion);
        }

        Ok(Self { rules: resolved })
    }

    pub fn resolve(&self, group_key: &str) -> Option<&Conversion> {
        self.rules.get(group_key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Stateless per-row price adjustment.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceConverter;

impl PriceConverter {
    /// The final price of a joined row, or `None` when it cannot be derived.
    pub fn adjust(&self, row: &JoinedRow) -> Option<f64> {
        self.classify(row).value()
    }

    /// Adjust a row and report which branch produced the result.
    ///
    /// `price / factor + mid` is only computed for `Convert` groups; a
    /// non-finite result (e.g. a zero factor) is reported as `NoMatch`.
    pub fn classify(&self, row: &JoinedRow) -> FinalPrice {
        match &row.conversion {
            None => FinalPrice::UnmappedGroup,
            Some(Conversion::Passthrough) => FinalPrice::Passthrough(row.price),
            Some(Conversion::Convert { factor, .. }) => match (row.price, row.mid_rate) {
                (Some(price), Some(mid)) => {
                    let value = price / factor + mid;
                    if value.is_finite() {
                        FinalPrice::Converted(value)
                    } else {
                        FinalPrice::NoMatch
                    }
                }
                _ => FinalPrice::NoMatch,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rule(key: &str, flag: Option<bool>, factor: Option<f64>) -> ConversionRule {
        ConversionRule {
            group_key: key.to_string(),
            convert_flag: flag,
            conversion_factor: factor,
        }
    }

    fn row(conversion: Option<Conversion>, price: Option<f64>, mid: Option<f64>) -> JoinedRow {
        JoinedRow {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            security_id: "S1".to_string(),
            group_key: "USDJPY".to_string(),
            price,
            conversion,
            mid_rate: mid,
        }
    }

    fn convert(factor: f64) -> Option<Conversion> {
        Some(Conversion::Convert {
            factor,
            group_key: "USDJPY".to_string(),
        })
    }

    #[test]
    fn passthrough_keeps_price_exactly() {
        let conv = PriceConverter;
        for price in [0.1, 1.0 / 3.0, 145.678, -2.5] {
            assert_eq!(conv.adjust(&row(Some(Conversion::Passthrough), Some(price), None)), Some(price));
            assert_eq!(conv.adjust(&row(Some(Conversion::Passthrough), Some(price), Some(9.0))), Some(price));
        }
    }

    #[test]
    fn convert_applies_factor_and_mid() {
        let out = PriceConverter.adjust(&row(convert(100.0), Some(50.0), Some(1.25)));
        assert!((out.unwrap() - 1.75).abs() < 1e-12);
    }

    #[test]
    fn convert_without_mid_is_no_match() {
        let r = row(convert(100.0), Some(50.0), None);
        assert_eq!(PriceConverter.classify(&r), FinalPrice::NoMatch);
        assert_eq!(PriceConverter.adjust(&r), None);
    }

    #[test]
    fn missing_rule_is_unmapped() {
        let r = row(None, Some(50.0), Some(1.0));
        assert_eq!(PriceConverter.classify(&r), FinalPrice::UnmappedGroup);
        assert_eq!(PriceConverter.adjust(&r), None);
    }

    #[test]
    fn zero_factor_does_not_leak_infinity() {
        assert_eq!(PriceConverter.adjust(&row(convert(0.0), Some(50.0), Some(1.0))), None);
    }

    #[test]
    fn rules_resolve_by_flag_and_factor() {
        let table = ConversionTable::from_rules(vec![
            rule("EURUSD", Some(false), None),
            rule("USDJPY", Some(true), Some(100.0)),
            rule("GBPUSD", None, Some(10.0)),
            rule("AUDUSD", Some(true), None),
        ])
        .unwrap();

        assert_eq!(table.resolve("EURUSD"), Some(&Conversion::Passthrough));
        assert_eq!(table.resolve("USDJPY"), convert(100.0).as_ref());
        assert!(matches!(table.resolve("GBPUSD"), Some(Conversion::Convert { factor, .. }) if *factor == 10.0));
        assert_eq!(table.resolve("AUDUSD"), None);
        assert_eq!(table.resolve("NZDUSD"), None);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn duplicate_group_key_is_rejected() {
        let err = ConversionTable::from_rules(vec![
            rule("EURUSD", Some(false), None),
            rule("EURUSD", Some(true), Some(1.0)),
        ])
        .unwrap_err();
        assert!(matches!(err, SeriesError::MalformedInput { .. }));
    }
}
