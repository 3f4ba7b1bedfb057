//! Error types and load result structures for the subscription loader.

use std::path::PathBuf;

/// Errors that can occur during subscription loading and persistence.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Subscription validation error (wrong kind, empty id, duplicate id).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Result alias for loader operations.
pub type Result<T> = std::result::Result<T, SubscriptionError>;

/// Outcome of loading a single subscription file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    Loaded { subscription_id: String },
    /// Dotfile, non-YAML file, etc.
    Skipped { reason: String },
    Failed { error: String },
}
