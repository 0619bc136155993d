//! Human-readable durations for configuration values.

use std::time::Duration;

/// Parse a duration such as `30s`, `1h`, `5m` or `500ms`.
///
/// A bare number is interpreted as seconds. Whitespace between the number
/// and the unit is allowed.
///
/// # Examples
/// ```
/// use airthings_wave_mqtt::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let split = src
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(src.len());
    let (number, unit) = src.split_at(split);
    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {src}"))?;

    match unit.trim() {
        "ms" => Ok(Duration::from_millis(value)),
        "" | "s" => Ok(Duration::from_secs(value)),
        "m" => value
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration too large: {src}")),
        "h" => value
            .checked_mul(3600)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration too large: {src}")),
        other => Err(format!("unknown duration unit '{other}' in {src}")),
    }
}
