//! Duration literals used by `cache ttl="..."`

use plasma_core::{Error, Result};
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

/// Parse `30m`, `1h`, `7d` style literals.
///
/// Supported units are `s`, `m`, `h`, `d` and `w`. A bare `0` is accepted and
/// means "do not cache".
pub fn parse_duration(literal: &str) -> Result<Duration> {
    let value = literal.trim();
    if value == "0" {
        return Ok(Duration::ZERO);
    }

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| Error::invalid_duration(literal, "missing unit suffix"))?;
    let (digits, unit) = value.split_at(split);

    if digits.is_empty() {
        return Err(Error::invalid_duration(literal, "missing numeric amount"));
    }

    let amount: u64 = digits
        .parse()
        .map_err(|e| Error::invalid_duration(literal, format!("bad amount: {e}")))?;

    let scale = match unit {
        "s" => 1,
        "m" => MINUTE,
        "h" => HOUR,
        "d" => DAY,
        "w" => WEEK,
        other => {
            return Err(Error::invalid_duration(
                literal,
                format!("unknown unit '{other}' (expected s, m, h, d or w)"),
            ))
        }
    };

    amount
        .checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::invalid_duration(literal, "duration overflows"))
}
