//! Duration strings in the `1h30m` / `15m` / `90s` / `500ms` grammar
//!
//! Units may be combined in descending order (`1h30m15s`). Fractional values
//! are accepted per component (`1.5m`). A bare number is read as seconds.

use std::time::Duration;

use crate::errors::{ConfigError, ConfigResult};

/// Parse a human duration string such as `15m` or `1h30m`
pub fn parse_duration(input: &str) -> ConfigResult<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidDuration(input.to_string()));
    }

    if let Ok(secs) = trimmed.parse::<f64>() {
        return secs_to_duration(secs, input);
    }

    let mut total = 0f64;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| ConfigError::InvalidDuration(input.to_string()))?;
        if number_len == 0 {
            return Err(ConfigError::InvalidDuration(input.to_string()));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| ConfigError::InvalidDuration(input.to_string()))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let multiplier = match &rest[..unit_len] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            _ => return Err(ConfigError::InvalidDuration(input.to_string())),
        };
        rest = &rest[unit_len..];
        total += value * multiplier;
    }

    secs_to_duration(total, input)
}

fn secs_to_duration(secs: f64, input: &str) -> ConfigResult<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::InvalidDuration(input.to_string()));
    }
    Ok(Duration::from_secs_f64(secs))
}
