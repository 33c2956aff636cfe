//! Duration literal parsing for binding intervals
//!
//! Accepts the literal format used across Kubernetes manifests:
//! a sequence of `<number><unit>` pairs such as `30s`, `1m30s` or `1.5h`.

use std::time::Duration;

use crate::error::{Error, Result};

/// Parse a duration literal into a strictly positive `Duration`
pub fn parse_duration(literal: &str) -> Result<Duration> {
    let invalid = |reason: String| Error::InvalidInterval {
        interval: literal.to_string(),
        reason,
    };

    let trimmed = literal.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty duration".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("duration must be positive".to_string()));
    }

    let mut rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let mut total_nanos = 0f64;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid(format!("expected a number at '{rest}'")));
        }
        let (number, tail) = rest.split_at(number_len);
        let value: f64 = number
            .parse()
            .map_err(|_| invalid(format!("malformed number '{number}'")))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            "" => return Err(invalid(format!("missing unit after '{number}'"))),
            other => return Err(invalid(format!("unknown unit '{other}'"))),
        };

        total_nanos += value * scale;
        rest = tail;
    }

    if total_nanos < 1.0 {
        return Err(invalid("duration must be positive".to_string()));
    }
    if total_nanos >= u64::MAX as f64 {
        return Err(invalid("duration overflows".to_string()));
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("15us").unwrap(), Duration::from_micros(15));
        assert_eq!(parse_duration("100ns").unwrap(), Duration::from_nanos(100));
    }

    #[test]
    fn test_compound_and_fractional() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1h2m3s").unwrap(), Duration::from_secs(3723));
        assert_eq!(parse_duration("+5s").unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_malformed() {
        for literal in ["", "   ", "30", "s", "5 s", "10d", "1..5s", "abc"] {
            let err = parse_duration(literal).unwrap_err();
            assert!(
                matches!(err, Error::InvalidInterval { .. }),
                "expected InvalidInterval for {literal:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("-5s").is_err());
    }
}
