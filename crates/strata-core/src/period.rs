//! ISO-8601 durations of fixed length (`P1D`, `PT1H`, `P1W`, `PT30S`).
//!
//! Calendar units (years, months) are rejected: the skip window is measured in
//! absolute time and a month has no fixed length.

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{CoreError, CoreResult};

/// Parses an ISO-8601 duration such as `P1DT12H` or `-PT1M`.
pub fn parse_period(text: &str) -> CoreResult<Duration> {
    let invalid = || CoreError::invalid_config(format!("`{}` is not a fixed ISO-8601 period", text));

    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let body = body
        .strip_prefix('P')
        .or_else(|| body.strip_prefix('p'))
        .ok_or_else(invalid)?;
    if body.is_empty() {
        return Err(invalid());
    }

    let mut total_millis: i64 = 0;
    let mut in_time = false;
    let mut number = String::new();
    let mut saw_component = false;

    for ch in body.chars() {
        match ch.to_ascii_uppercase() {
            'T' => {
                if in_time || !number.is_empty() {
                    return Err(invalid());
                }
                in_time = true;
            }
            c if c.is_ascii_digit() || c == '.' => number.push(c),
            unit => {
                if number.is_empty() {
                    return Err(invalid());
                }
                let value: f64 = number.parse().map_err(|_| invalid())?;
                number.clear();
                let unit_millis: f64 = match (in_time, unit) {
                    (false, 'W') => 7.0 * 86_400_000.0,
                    (false, 'D') => 86_400_000.0,
                    (true, 'H') => 3_600_000.0,
                    (true, 'M') => 60_000.0,
                    (true, 'S') => 1_000.0,
                    _ => return Err(invalid()),
                };
                let component = (value * unit_millis).round();
                if !component.is_finite() || component >= i64::MAX as f64 {
                    return Err(invalid());
                }
                total_millis = total_millis
                    .checked_add(component as i64)
                    .ok_or_else(invalid)?;
                saw_component = true;
            }
        }
    }

    if !number.is_empty() || !saw_component {
        return Err(invalid());
    }

    let millis = if negative { -total_millis } else { total_millis };
    Duration::try_milliseconds(millis).ok_or_else(invalid)
}

/// Formats a duration as a canonical ISO-8601 period (`P1DT2H`, `PT0S`).
#[must_use]
pub fn format_period(duration: Duration) -> String {
    let mut millis = duration.num_milliseconds();
    let mut out = String::new();
    if millis < 0 {
        out.push('-');
        millis = -millis;
    }
    out.push('P');

    let days = millis / 86_400_000;
    millis %= 86_400_000;
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if millis == 0 {
        if days == 0 {
            out.push_str("T0S");
        }
        return out;
    }

    out.push('T');
    let hours = millis / 3_600_000;
    millis %= 3_600_000;
    let minutes = millis / 60_000;
    millis %= 60_000;
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if millis > 0 {
        if millis % 1_000 == 0 {
            out.push_str(&format!("{}S", millis / 1_000));
        } else {
            out.push_str(&format!("{}.{:03}S", millis / 1_000, millis % 1_000));
        }
    }
    out
}

/// `#[serde(with = "period::serde_period")]` adapter for `chrono::Duration` fields.
pub mod serde_period {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_period(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_period(&text).map_err(serde::de::Error::custom)
    }
}
