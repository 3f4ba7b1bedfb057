//! Alert subscription selection, dedup and routing.
//!
//! This crate provides:
//! - YAML `AlertSubscription` documents with a filesystem loader and hot-reload
//! - Per-detector watermarks (`VectorClock`) with a propose/commit split
//! - `SelectionEngine`: legacy vs current identifier matching, time bounds,
//!   watermark dedup and pluggable legacy filter strategies
//! - Broadcast recipient routing and a notification `Dispatcher`
//! - `SubscriptionRunner` that serializes runs per subscription and commits
//!   watermarks only after delivery
//! - Cron scheduling for subscriptions

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod loader;
pub mod result;
pub mod router;
pub mod runner;
pub mod scheduler;
pub mod schema;
pub mod source;
pub mod strategy;
pub mod vector_clock;

pub use engine::SelectionEngine;
pub use error::{AlertError, Result};
pub use result::AlertFilterResult;
pub use vector_clock::VectorClock;
