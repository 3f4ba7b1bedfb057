//! Per-subscription schedule entry type.

use chrono::{DateTime, Utc};

/// Scheduling state for a single subscription.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub subscription_id: String,
    /// Parsed schedule; `None` means "every tick".
    pub schedule: Option<cron::Schedule>,
    /// Timestamp of the last evaluation started by the worker.
    pub last_run: Option<DateTime<Utc>>,
    /// Disabled subscriptions and subscriptions with an unparsable cron
    /// expression never run.
    pub enabled: bool,
}
