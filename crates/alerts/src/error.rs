//! Errors surfaced by an evaluation run.
//!
//! Every variant aborts the run before any watermark is committed, so the
//! caller can always retry the whole evaluation.

use vigil_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// `legacyFilterClassName` names no registered strategy.
    #[error("Unknown legacy filter strategy: {0}")]
    UnknownLegacyStrategy(String),

    /// The subscription has a mode but nothing to match it against.
    #[error("Invalid mode for subscription '{subscription_id}': subscribedIds is empty")]
    InvalidMode { subscription_id: String },

    /// Transient failure reading the anomaly population.
    #[error("Anomaly source unavailable: {0}")]
    SourceUnavailable(String),

    /// A record in the anomaly population violates the data model.
    #[error(transparent)]
    MalformedAnomaly(#[from] CoreError),

    #[error("Strategy '{strategy}' rejected its config: {reason}")]
    StrategyConfig { strategy: String, reason: String },

    #[error("Subscription '{0}' already has an evaluation in flight")]
    RunInProgress(String),

    #[error("Unknown subscription: {0}")]
    UnknownSubscription(String),

    #[error("Watermark store error: {0}")]
    Store(String),
}

/// Result alias for evaluation operations.
pub type Result<T> = std::result::Result<T, AlertError>;
