//! Formatted terminal output for run summaries.
//!
//! We keep formatting code in one place so the alignment/windowing code stays
//! free of presentation concerns.

use crate::domain::{RatesSummary, StdevSummary};
use crate::series::format_timestamp;

/// Format the adjusted-price run summary.
pub fn format_rates_summary(summary: &RatesSummary) -> String {
    let mut out = String::new();

    out.push_str("=== tsa - adjusted prices ===\n");
    out.push_str(&format!("Rows: {} across {} currency pairs\n", summary.rows, summary.groups));
    out.push_str(&format!("  passthrough       {:>8}\n", summary.passthrough));
    out.push_str(&format!("  converted         {:>8}\n", summary.converted));
    out.push_str(&format!("  no rate in range  {:>8}\n", summary.no_match));
    out.push_str(&format!("  unmapped pair     {:>8}\n", summary.unmapped_group));
    out.push_str(&format!(
        "Insufficient data: {} ({})\n",
        summary.insufficient(),
        fmt_pct(summary.insufficient(), summary.rows)
    ));

    out
}

/// Format the rolling-statistic run summary.
pub fn format_stdev_summary(summary: &StdevSummary) -> String {
    let mut out = String::new();

    out.push_str("=== tsa - rolling standard deviation ===\n");
    out.push_str(&format!(
        "Input: {} rows | entities={} | window={}\n",
        summary.input_rows, summary.entities, summary.window
    ));
    if let (Some(start), Some(end)) = (summary.grid_start, summary.grid_end) {
        out.push_str(&format!(
            "Grid: [{}, {}] | rows={}\n",
            format_timestamp(&start),
            format_timestamp(&end),
            summary.grid_rows
        ));
    }

    out.push('\n');
    out.push_str(format!("{:<20} {:>10} {:>10} {:>8} {:>10}", "column", "samples", "valid", "valid%", "filled").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<20} {:-<10} {:-<10} {:-<8} {:-<10}", "", "", "", "", "").trim_end());
    out.push('\n');
    for c in &summary.columns {
        out.push_str(
            format!(
                "{:<20} {:>10} {:>10} {:>8} {:>10}",
                truncate(&c.name, 20),
                c.samples,
                c.valid,
                fmt_pct(c.valid, c.samples),
                c.filled
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_pct(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "-".to_string();
    }
    format!("{:.1}%", 100.0 * part as f64 / whole as f64)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ColumnSummary;

    #[test]
    fn rates_summary_reports_insufficient_share() {
        let summary = RatesSummary {
            rows: 4,
            groups: 2,
            passthrough: 1,
            converted: 2,
            no_match: 1,
            unmapped_group: 0,
        };
        let text = format_rates_summary(&summary);
        assert!(text.contains("Rows: 4 across 2 currency pairs"));
        assert!(text.contains("Insufficient data: 1 (25.0%)"));
    }

    #[test]
    fn stdev_summary_lists_columns() {
        let summary = StdevSummary {
            entities: 1,
            input_rows: 3,
            window: 2,
            columns: vec![ColumnSummary {
                name: "a_very_long_column_name_indeed".to_string(),
                samples: 3,
                valid: 2,
                filled: 4,
            }],
            grid_start: None,
            grid_end: None,
            grid_rows: 4,
        };
        let text = format_stdev_summary(&summary);
        assert!(text.contains("window=2"));
        assert!(text.contains("a_very_long_column_."));
        assert!(text.contains("66.7%"));
        assert!(!text.contains("Grid:"));
    }

    #[test]
    fn percentages_handle_empty_totals() {
        assert_eq!(fmt_pct(0, 0), "-");
    }
}
