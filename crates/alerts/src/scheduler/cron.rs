//! Cron normalization and due-check helpers.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;

/// Normalize a 5-field cron expression to 6 fields by prepending a `0`
/// seconds field. The `cron` crate requires `sec min hour dom month dow`.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Parse a 5- or 6-field expression.
pub(crate) fn parse_schedule(expr: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(&normalize_cron(expr))
}

/// Whether a tick of `schedule` falls in `(last_run, now]`. Without a
/// previous run the window starts one day before `now`.
pub(crate) fn is_due(schedule: &Schedule, now: DateTime<Utc>, last_run: Option<DateTime<Utc>>) -> bool {
    let window_start = last_run.unwrap_or(now - Duration::days(1));
    schedule
        .after(&window_start)
        .next()
        .map(|tick| tick <= now)
        .unwrap_or(false)
}
