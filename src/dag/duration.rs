//! # Go-Style Duration Parsing
//!
//! CORS `max-age`, retry `per-try-timeout`, and route timeouts are all
//! accepted as Go-style duration strings (`"10m"`, `"0s"`, `"-10m"`,
//! `"1h30m"`) per spec §4.2. This module is the single place that parses
//! them into seconds.

use regex::Regex;
use std::sync::OnceLock;

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)(ns|us|µs|ms|s|m|h)").expect("valid regex"))
}

/// Parses a Go-style duration string into seconds. Returns `None` if the
/// string contains no recognizable duration components.
pub fn parse_go_duration_seconds(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    let negative = trimmed.starts_with('-');
    let body = trimmed.trim_start_matches('-');

    let mut total = 0.0;
    let mut matched_any = false;
    for captures in duration_regex().captures_iter(body) {
        matched_any = true;
        let value: f64 = captures[1].parse().ok()?;
        let unit_seconds = match &captures[2] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            "us" | "µs" => 0.000_001,
            "ns" => 0.000_000_001,
            _ => return None,
        };
        total += value * unit_seconds;
    }

    if !matched_any {
        return None;
    }
    Some(if negative { -total } else { total })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes() {
        assert_eq!(parse_go_duration_seconds("10m"), Some(600.0));
    }

    #[test]
    fn parses_zero_seconds() {
        assert_eq!(parse_go_duration_seconds("0s"), Some(0.0));
    }

    #[test]
    fn parses_negative_duration() {
        assert_eq!(parse_go_duration_seconds("-10m"), Some(-600.0));
    }

    #[test]
    fn parses_compound_duration() {
        assert_eq!(parse_go_duration_seconds("1h30m"), Some(5400.0));
    }

    #[test]
    fn rejects_unparseable_string() {
        assert_eq!(parse_go_duration_seconds("banana"), None);
    }
}
