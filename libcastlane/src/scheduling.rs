//! Parsing of human-written schedule times
//!
//! Accepted forms, tried in order:
//! - `now`
//! - RFC 3339 timestamps: `2025-11-20T15:00:00Z`
//! - Offsets from now: `30m`, `2h 30m`, `in 1d`
//! - Natural language: `tomorrow 3pm`, `next monday 10am`
//! - Random offsets: `random:10m-20m`

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::error::{CastlaneError, Result};

const MIN_RANDOM_SECONDS: i64 = 30;
const MAX_RANDOM_SECONDS: i64 = 30 * 24 * 3600;

/// Resolve `input` to an absolute UTC time relative to `now`.
pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CastlaneError::InvalidInput(
            "Schedule time cannot be empty".to_string(),
        ));
    }

    if input.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    if let Some(range) = input.strip_prefix("random:") {
        return parse_random(range, now);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let offset = input.strip_prefix("in ").unwrap_or(input);
    if let Some(duration) = parse_duration(offset) {
        return Ok(now + duration);
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us).map_err(|_| {
        CastlaneError::InvalidInput(format!(
            "Could not parse schedule time '{}'. Try '2h', 'tomorrow 3pm', an RFC 3339 timestamp or 'random:10m-20m'",
            input
        ))
    })
}

fn parse_duration(input: &str) -> Option<Duration> {
    let std_duration = humantime::parse_duration(input.trim()).ok()?;
    Duration::try_seconds(i64::try_from(std_duration.as_secs()).ok()?)
}

fn parse_random(range: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let (min, max) = range.split_once('-').ok_or_else(|| {
        CastlaneError::InvalidInput("Random schedule must look like random:MIN-MAX".to_string())
    })?;

    let invalid = |part: &str| CastlaneError::InvalidInput(format!("Invalid duration '{}'", part));
    let min = parse_duration(min).ok_or_else(|| invalid(min))?.num_seconds();
    let max = parse_duration(max).ok_or_else(|| invalid(max))?.num_seconds();

    if min < MIN_RANDOM_SECONDS {
        return Err(CastlaneError::InvalidInput(format!(
            "Minimum random interval must be at least {} seconds",
            MIN_RANDOM_SECONDS
        )));
    }
    if max > MAX_RANDOM_SECONDS {
        return Err(CastlaneError::InvalidInput(format!(
            "Maximum random interval must be at most {} days",
            MAX_RANDOM_SECONDS / (24 * 3600)
        )));
    }
    if min >= max {
        return Err(CastlaneError::InvalidInput(
            "Random minimum must be less than maximum".to_string(),
        ));
    }

    let seconds = rand::thread_rng().gen_range(min..=max);
    Ok(now + Duration::seconds(seconds))
}
