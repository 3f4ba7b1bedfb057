//! Filesystem subscription loader with hot-reload via `notify` watcher.
//!
//! Scans the subscriptions directory for YAML documents, keeps them in memory
//! keyed by `metadata.id`, reloads them on change and persists committed
//! watermarks back to the document they came from.

mod core;
mod error;
mod watcher;


pub use self::core::SubscriptionLoader;
pub use self::error::{LoadResult, LoadStatus, Result, SubscriptionError};
