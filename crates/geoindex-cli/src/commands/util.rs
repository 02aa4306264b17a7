//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::TimeDelta;
use regex::Regex;

/// Pre-compiled regex for duration parsing.
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-)?(\d+)\s*(s|m|h|d)$").unwrap());

/// Parse a signed duration such as `30s`, `10m`, `24h`, `2d` or `-2h`.
pub fn parse_duration(s: &str) -> anyhow::Result<TimeDelta> {
    let s = s.trim();
    let Some(caps) = DURATION_RE.captures(s) else {
        anyhow::bail!(
            "Invalid duration: {s}. Use a number and a unit (e.g., 90s, 10m, 24h, 2d, -2h)"
        );
    };

    let n: i64 = caps[2]
        .parse()
        .context("failed to parse number in duration")?;

    let seconds_per_unit = match &caps[3] {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        unit => anyhow::bail!("Unknown duration unit: {unit}"),
    };

    let seconds = n
        .checked_mul(seconds_per_unit)
        .and_then(TimeDelta::try_seconds)
        .with_context(|| format!("Duration too large: {s}"))?;

    Ok(if caps.get(1).is_some() {
        -seconds
    } else {
        seconds
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration("90s").unwrap(), TimeDelta::seconds(90));
        assert_eq!(parse_duration("10m").unwrap(), TimeDelta::minutes(10));
        assert_eq!(parse_duration("24h").unwrap(), TimeDelta::hours(24));
        assert_eq!(parse_duration("2d").unwrap(), TimeDelta::days(2));
        assert_eq!(parse_duration("5 m").unwrap(), TimeDelta::minutes(5));
    }

    #[test]
    fn parses_negative_durations() {
        assert_eq!(parse_duration("-2h").unwrap(), TimeDelta::hours(-2));
    }

    #[test]
    fn rejects_malformed_durations() {
        for input in ["", "10", "h", "1.5h", "10 minutes", "--2h"] {
            assert!(parse_duration(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn rejects_overflowing_durations() {
        let err = parse_duration("99999999999999999d").unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
