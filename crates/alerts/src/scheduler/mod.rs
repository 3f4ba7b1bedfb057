//! Per-subscription cron scheduling.
//!
//! The worker ticks at a fixed interval; [`SubscriptionScheduler`] decides
//! which subscriptions are due on a given tick. Subscriptions without a
//! `schedule` block run on every tick.

mod core;
pub(crate) mod cron;
mod entry;


pub use self::core::SubscriptionScheduler;
pub use self::entry::ScheduleEntry;
