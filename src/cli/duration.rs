//! Human-friendly durations: `1h`, `30m`, `1h30m`, `2d`, `1hr`.

use chrono::TimeDelta;

/// Parse a duration made of one or more `<integer><unit>` terms.
///
/// Units: `s|sec|secs`, `m|min|mins`, `h|hr|hrs|hour|hours`, `d|day|days`.
pub fn parse_duration(s: &str) -> Result<TimeDelta, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = TimeDelta::zero();
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("invalid duration '{s}': expected a number before '{rest}'"));
        }
        let amount: i64 = rest[..digits]
            .parse()
            .map_err(|e| format!("invalid duration '{s}': {e}"))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = rest[..unit_len].trim().to_ascii_lowercase();
        rest = &rest[unit_len..];

        let term = match unit.as_str() {
            "s" | "sec" | "secs" => TimeDelta::try_seconds(amount),
            "m" | "min" | "mins" => TimeDelta::try_minutes(amount),
            "h" | "hr" | "hrs" | "hour" | "hours" => TimeDelta::try_hours(amount),
            "d" | "day" | "days" => TimeDelta::try_days(amount),
            "" => return Err(format!("invalid duration '{s}': missing unit after {amount}")),
            other => return Err(format!("invalid duration '{s}': unknown unit '{other}'")),
        };
        total = term
            .and_then(|t| total.checked_add(&t))
            .ok_or_else(|| format!("duration '{s}' is out of range"))?;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_terms() {
        assert_eq!(parse_duration("1h").unwrap(), TimeDelta::hours(1));
        assert_eq!(parse_duration("1hr").unwrap(), TimeDelta::hours(1));
        assert_eq!(parse_duration("30m").unwrap(), TimeDelta::minutes(30));
        assert_eq!(parse_duration("45s").unwrap(), TimeDelta::seconds(45));
        assert_eq!(parse_duration("2days").unwrap(), TimeDelta::days(2));
        assert_eq!(parse_duration("0s").unwrap(), TimeDelta::zero());
    }

    #[test]
    fn parses_compound_terms() {
        assert_eq!(parse_duration("1h30m").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_duration("1d 2h").unwrap(), TimeDelta::hours(26));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("5 weeks").is_err());
        assert!(parse_duration("-1h").is_err());
    }
}
