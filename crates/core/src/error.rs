use thiserror::Error;

use crate::anomaly::AnomalyId;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed anomaly {id}: {reason}")]
    MalformedAnomaly { id: AnomalyId, reason: String },
}
