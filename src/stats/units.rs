// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Human-compact unit grammars used by agent summaries.
//!
//! Durations combine hour/minute/second components ("2h 5m 10s", "1m",
//! "32.5s"); token counts are plain integers or a decimal magnitude with a
//! `k`/`m` suffix ("231.5k", "2M").

use once_cell::sync::Lazy;
use regex::Regex;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*
        (?:(?P<h>\d+(?:\.\d+)?)\s*h)?\s*
        (?:(?P<m>\d+(?:\.\d+)?)\s*m)?\s*
        (?:(?P<s>\d+(?:\.\d+)?)\s*s)?\s*
        $",
    )
    .expect("valid duration regex")
});

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?P<n>\d+(?:\.\d+)?)\s*(?P<suffix>[km])?\s*$")
        .expect("valid token regex")
});

/// Parse a human duration string into seconds.
///
/// Unrecognized or empty input parses to 0.
pub fn parse_duration_secs(input: &str) -> f64 {
    let Some(caps) = DURATION_RE.captures(input) else {
        return 0.0;
    };

    let component = |name: &str| {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    component("h") * 3600.0 + component("m") * 60.0 + component("s")
}

/// Parse a compact token count ("500", "231.5k", "2M").
pub fn parse_token_count(input: &str) -> Option<u64> {
    let caps = TOKEN_RE.captures(input)?;
    let value: f64 = caps.name("n")?.as_str().parse().ok()?;
    let multiplier = match caps.name("suffix").map(|m| m.as_str().to_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };
    Some((value * multiplier).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_full() {
        assert_eq!(parse_duration_secs("2h 5m 10s"), 7510.0);
    }

    #[test]
    fn test_duration_minutes_seconds() {
        assert_eq!(parse_duration_secs("1m 30s"), 90.0);
    }

    #[test]
    fn test_duration_fractional_seconds() {
        assert_eq!(parse_duration_secs("32.5s"), 32.5);
    }

    #[test]
    fn test_duration_single_components() {
        assert_eq!(parse_duration_secs("32s"), 32.0);
        assert_eq!(parse_duration_secs("1m"), 60.0);
        assert_eq!(parse_duration_secs("3h"), 10800.0);
    }

    #[test]
    fn test_duration_empty_and_garbage() {
        assert_eq!(parse_duration_secs(""), 0.0);
        assert_eq!(parse_duration_secs("soon"), 0.0);
    }

    #[test]
    fn test_token_plain() {
        assert_eq!(parse_token_count("500"), Some(500));
    }

    #[test]
    fn test_token_kilo() {
        assert_eq!(parse_token_count("231.5k"), Some(231_500));
        assert_eq!(parse_token_count("231.5K"), Some(231_500));
    }

    #[test]
    fn test_token_mega() {
        assert_eq!(parse_token_count("2M"), Some(2_000_000));
        assert_eq!(parse_token_count("1.2m"), Some(1_200_000));
    }

    #[test]
    fn test_token_whitespace() {
        assert_eq!(parse_token_count(" 42 k "), Some(42_000));
    }

    #[test]
    fn test_token_invalid() {
        assert_eq!(parse_token_count(""), None);
        assert_eq!(parse_token_count("many"), None);
        assert_eq!(parse_token_count("5g"), None);
    }
}
