//! Compact duration tokens: `25m`, `90m`, `1h`, `1h30m`, `1.5h`, `45s`.
//!
//! A token is one or more `<magnitude><unit>` segments with units `h`, `m`, `s`.
//! Focus, lock timebox and decompression end times are all computed here.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{StateError, StateResult};

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+(?:\.\d+)?[hms])+$").expect("static duration regex"));

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)([hms])").expect("static duration regex"));

/// Parse a duration token into a positive [`Duration`] with millisecond precision.
pub fn parse_duration(token: &str) -> StateResult<Duration> {
    let token = token.trim();
    if !TOKEN_RE.is_match(token) {
        return Err(invalid(token));
    }

    let mut total_ms = 0f64;
    for caps in SEGMENT_RE.captures_iter(token) {
        let magnitude: f64 = caps[1].parse().map_err(|_| invalid(token))?;
        let unit_ms = match &caps[2] {
            "h" => 3_600_000f64,
            "m" => 60_000f64,
            _ => 1_000f64,
        };
        total_ms += magnitude * unit_ms;
    }

    let total_ms = total_ms.round();
    if !total_ms.is_finite() || total_ms <= 0.0 || total_ms > i64::MAX as f64 {
        return Err(invalid(token));
    }
    Duration::try_milliseconds(total_ms as i64).ok_or_else(|| invalid(token))
}

/// `start + duration(token)`.
pub fn calculate_end_time(start: DateTime<Utc>, token: &str) -> StateResult<DateTime<Utc>> {
    let d = parse_duration(token)?;
    start.checked_add_signed(d).ok_or_else(|| invalid(token))
}

fn invalid(token: &str) -> StateError {
    StateError::InvalidDuration(format!(
        "'{}' is not a positive duration like '25m', '90m', '1h' or '1h30m'",
        token
    ))
}
