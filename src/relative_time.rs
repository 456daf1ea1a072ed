//! Human readable "in 3 hours" / "5 minutes ago" strings.

use chrono::{DateTime, Utc};

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
// Mean Gregorian month and year.
const DAYS_PER_MONTH: f64 = 146_097.0 / 4_800.0;
const DAYS_PER_YEAR: f64 = 146_097.0 / 400.0;

/// Relative description of `target` as seen from `now`.
pub fn from_now(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta_ms = target.signed_duration_since(now).num_milliseconds();
    let phrase = humanize_millis(delta_ms.unsigned_abs());

    if delta_ms > 0 {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

/// Unsigned span rendered with the usual rounding thresholds.
pub fn humanize_millis(span_ms: u64) -> String {
    let total_seconds = span_ms as f64 / 1_000.0;

    let seconds = total_seconds.round();
    let minutes = (total_seconds / SECONDS_PER_MINUTE).round();
    let hours = (total_seconds / SECONDS_PER_HOUR).round();
    let days = (total_seconds / SECONDS_PER_DAY).round();
    let months = (total_seconds / SECONDS_PER_DAY / DAYS_PER_MONTH).round();
    let years = (total_seconds / SECONDS_PER_DAY / DAYS_PER_YEAR).round();

    if seconds < 45.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{minutes} minutes")
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{hours} hours")
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{days} days")
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{months} months")
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{years} years")
    }
}
