//! Interval strings such as `5s`, `250ms` or `1m30s`

use std::time::Duration;

use crate::errors::ConfigError;

/// Parse a positive interval made of `<number><unit>` segments.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. Numbers may be decimal.
pub fn parse_interval(input: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidInterval {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid("empty interval"));
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(invalid("expected a number"));
        }
        let value: f64 = rest[..number_end]
            .parse()
            .map_err(|_| invalid("malformed number"))?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit")),
        };
        total_nanos += value * scale;
        rest = &rest[unit_end..];
    }

    if total_nanos < 1.0 {
        return Err(invalid("interval must be positive"));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
