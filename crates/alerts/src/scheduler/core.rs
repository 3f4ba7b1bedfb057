//! [`SubscriptionScheduler`]: decides which subscriptions run on a tick.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::schema::AlertSubscription;

use super::cron::{is_due, parse_schedule};
use super::entry::ScheduleEntry;

/// Scheduling state for all loaded subscriptions.
///
/// Call [`sync`](SubscriptionScheduler::sync) whenever the subscription set
/// changes (e.g., after hot-reload) and [`due`](SubscriptionScheduler::due)
/// from the worker tick loop.
#[derive(Debug, Default)]
pub struct SubscriptionScheduler {
    entries: HashMap<String, ScheduleEntry>,
}

impl SubscriptionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add, update or drop entries to match `subscriptions`. `last_run` is
    /// preserved for subscriptions that stay.
    pub fn sync(&mut self, subscriptions: &[AlertSubscription]) {
        let current: HashSet<&str> = subscriptions.iter().map(|s| s.id()).collect();
        self.entries.retain(|id, _| current.contains(id.as_str()));

        for sub in subscriptions {
            let id = sub.id();
            let (schedule, valid) = match &sub.schedule {
                None => (None, true),
                Some(s) => match parse_schedule(&s.cron) {
                    Ok(parsed) => (Some(parsed), true),
                    Err(e) => {
                        warn!(
                            subscription_id = %id,
                            cron = %s.cron,
                            error = %e,
                            "invalid cron expression, subscription will not run"
                        );
                        (None, false)
                    }
                },
            };
            let enabled = sub.metadata.enabled && valid;

            let entry = self
                .entries
                .entry(id.to_string())
                .or_insert_with(|| ScheduleEntry {
                    subscription_id: id.to_string(),
                    schedule: None,
                    last_run: None,
                    enabled,
                });
            entry.schedule = schedule;
            entry.enabled = enabled;
        }
    }

    /// Whether a subscription should run at `now`.
    pub fn should_run(&self, subscription_id: &str, now: DateTime<Utc>) -> bool {
        let Some(entry) = self.entries.get(subscription_id) else {
            return false;
        };
        if !entry.enabled {
            return false;
        }
        match &entry.schedule {
            None => true,
            Some(schedule) => is_due(schedule, now, entry.last_run),
        }
    }

    /// Record that a run was started at `at`.
    pub fn record_run(&mut self, subscription_id: &str, at: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(subscription_id) {
            entry.last_run = Some(at);
        }
    }

    /// Ids of all subscriptions due at `now`, sorted.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut due: Vec<String> = self
            .entries
            .keys()
            .filter(|id| self.should_run(id, now))
            .cloned()
            .collect();
        due.sort();
        due
    }

    pub fn get(&self, subscription_id: &str) -> Option<&ScheduleEntry> {
        self.entries.get(subscription_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
