//! Time bounds for log queries.
//!
//! Accepted forms:
//! - Unix seconds: `1738944000`
//! - ISO 8601 / RFC 3339: `2026-02-07T17:00:00`, `2026-02-07T17:00:00+02:00`
//! - Relative to now: `-90s`, `-30m`, `-1h`, `-2d`, `-1w`
//! - Date+time (UTC): `2026-02-07:07:00` or `2026-02-07:07:00:00`
//! - Time only (base day, UTC): `07:00`

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse time '{input}': {message}")]
pub struct TimeParseError {
    pub input: String,
    pub message: String,
}

impl TimeParseError {
    fn new(input: &str, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

/// Parses a time expression into Unix seconds, relative to the current time.
pub fn parse_time(input: &str) -> Result<u64, TimeParseError> {
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
    parse_time_with_base(input, now)
}

/// Parses a time expression using `base` (Unix seconds) as "now".
///
/// Relative offsets count back from `base`; a bare `HH:MM` lands on the
/// UTC day of `base`.
pub fn parse_time_with_base(input: &str, base: u64) -> Result<u64, TimeParseError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(TimeParseError::new(input, "empty time"));
    }

    if input.bytes().all(|b| b.is_ascii_digit()) {
        return input
            .parse::<u64>()
            .map_err(|e| TimeParseError::new(input, e.to_string()));
    }

    if let Some(back) = relative_seconds(input) {
        return base
            .checked_sub(back)
            .ok_or_else(|| TimeParseError::new(input, "relative time before epoch"));
    }

    let ts = try_parse_iso8601(input)
        .or_else(|| try_parse_date_colon_time(input))
        .or_else(|| try_parse_time_only(input, base))
        .ok_or_else(|| {
            TimeParseError::new(
                input,
                "unrecognized format; use unix seconds (1738944000), ISO 8601 \
                 (2026-02-07T17:00:00), relative (-1h, -30m, -2d), \
                 date:time (2026-02-07:07:00) or time only (07:00)",
            )
        })?;

    u64::try_from(ts).map_err(|_| TimeParseError::new(input, "time before epoch"))
}

/// `-<n><unit>` as a number of seconds to go back.
fn relative_seconds(input: &str) -> Option<u64> {
    let rest = input.strip_prefix('-')?;
    let unit = rest.chars().last()?;
    let number: u64 = rest[..rest.len() - unit.len_utf8()].parse().ok()?;

    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        'w' => 604800,
        _ => return None,
    };
    number.checked_mul(scale)
}

fn try_parse_iso8601(input: &str) -> Option<i64> {
    if !input.contains('T') {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc).timestamp());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|ndt| Utc.from_utc_datetime(&ndt).timestamp())
}

/// `YYYY-MM-DD:HH:MM[:SS]`
fn try_parse_date_colon_time(input: &str) -> Option<i64> {
    let (date_part, time_part) = (input.get(..10)?, input.get(10..)?.strip_prefix(':')?);
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    let time = match time_part.len() {
        5 => NaiveTime::parse_from_str(time_part, "%H:%M").ok()?,
        8 => NaiveTime::parse_from_str(time_part, "%H:%M:%S").ok()?,
        _ => return None,
    };
    Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)).timestamp())
}

fn try_parse_time_only(input: &str, base: u64) -> Option<i64> {
    if input.len() != 5 || input.as_bytes().get(2) != Some(&b':') {
        return None;
    }
    let time = NaiveTime::parse_from_str(input, "%H:%M").ok()?;
    let base_date = Utc
        .timestamp_opt(i64::try_from(base).ok()?, 0)
        .single()?
        .date_naive();
    Some(
        Utc.from_utc_datetime(&NaiveDateTime::new(base_date, time))
            .timestamp(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> u64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .unwrap()
            .timestamp() as u64
    }

    #[test]
    fn test_unix_timestamp() {
        assert_eq!(parse_time("1738944000").unwrap(), 1738944000);
        assert_eq!(parse_time("0").unwrap(), 0);
        assert_eq!(parse_time(" 42 ").unwrap(), 42);
    }

    #[test]
    fn test_relative_time() {
        let base = 1_000_000;
        assert_eq!(parse_time_with_base("-1h", base).unwrap(), base - 3600);
        assert_eq!(parse_time_with_base("-30m", base).unwrap(), base - 1800);
        assert_eq!(parse_time_with_base("-2d", base).unwrap(), base - 172800);
        assert_eq!(parse_time_with_base("-1w", base).unwrap(), base - 604800);
        assert_eq!(parse_time_with_base("-60s", base).unwrap(), base - 60);
    }

    #[test]
    fn test_relative_before_epoch() {
        assert!(parse_time_with_base("-1h", 100).is_err());
    }

    #[test]
    fn test_relative_to_now() {
        let now = Utc::now().timestamp() as u64;
        let ts = parse_time("-1h").unwrap();
        assert!(ts.abs_diff(now - 3600) < 2);
    }

    #[test]
    fn test_iso8601() {
        let expected = utc(2026, 2, 7, 17, 0, 0);
        assert_eq!(parse_time("2026-02-07T17:00:00").unwrap(), expected);
        assert_eq!(parse_time("2026-02-07T17:00").unwrap(), expected);
        assert_eq!(parse_time("2026-02-07T17:00:00Z").unwrap(), expected);
        assert_eq!(parse_time("2026-02-07T19:00:00+02:00").unwrap(), expected);
    }

    #[test]
    fn test_date_colon_time() {
        let expected = utc(2026, 2, 7, 17, 0, 0);
        assert_eq!(parse_time("2026-02-07:17:00").unwrap(), expected);
        assert_eq!(parse_time("2026-02-07:17:00:00").unwrap(), expected);
    }

    #[test]
    fn test_time_only_uses_base_day() {
        let base = utc(2026, 2, 8, 10, 0, 0);
        assert_eq!(
            parse_time_with_base("16:00", base).unwrap(),
            utc(2026, 2, 8, 16, 0, 0)
        );
    }

    #[test]
    fn test_invalid_formats() {
        assert!(parse_time("").is_err());
        assert!(parse_time("invalid").is_err());
        assert!(parse_time("2026-02-07").is_err());
        assert!(parse_time("-abc").is_err());
        assert!(parse_time("-").is_err());
        assert!(parse_time("12:34:56:78").is_err());
        assert!(parse_time("1969-12-31T00:00:00").is_err());
    }
}
