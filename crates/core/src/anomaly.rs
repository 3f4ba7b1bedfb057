use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Identifier of a detector: a detection-config id or a legacy function id,
/// depending on the [`Origin`] it is wrapped in.
pub type DetectorId = u64;

/// Opaque unique anomaly identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnomalyId(pub u64);

impl std::fmt::Display for AnomalyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline generation that produced an anomaly, with the detector id in
/// that generation's namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "pipeline", content = "id", rename_all = "snake_case")]
pub enum Origin {
    CurrentDetector(DetectorId),
    LegacyFunction(DetectorId),
}

impl Origin {
    pub fn id(&self) -> DetectorId {
        match self {
            Origin::CurrentDetector(id) | Origin::LegacyFunction(id) => *id,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Origin::LegacyFunction(_))
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::CurrentDetector(id) => write!(f, "detection-config:{}", id),
            Origin::LegacyFunction(id) => write!(f, "legacy-function:{}", id),
        }
    }
}

/// An immutable detected anomaly covering `[window_start, window_end)`.
///
/// Equality, ordering and hashing use `id` only, so two events with the same
/// id are the same set member regardless of their payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyEvent {
    pub id: AnomalyId,
    pub origin: Origin,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

impl AnomalyEvent {
    /// Build an event, rejecting empty or inverted windows.
    pub fn new(
        id: AnomalyId,
        origin: Origin,
        window_start: Timestamp,
        window_end: Timestamp,
    ) -> Result<Self, CoreError> {
        if window_start >= window_end {
            return Err(CoreError::MalformedAnomaly {
                id,
                reason: format!("window [{window_start}, {window_end}) is empty"),
            });
        }
        Ok(Self {
            id,
            origin,
            window_start,
            window_end,
            score: 0.0,
            metric: None,
        })
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }
}

impl PartialEq for AnomalyEvent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AnomalyEvent {}

impl PartialOrd for AnomalyEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AnomalyEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for AnomalyEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ── Wire format ──────────────────────────────────────────────────────

/// Anomaly as stored by the detection pipelines: two nullable detector
/// columns, of which exactly one must be set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyRecord {
    pub id: AnomalyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_config_id: Option<DetectorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_id: Option<DetectorId>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

impl TryFrom<AnomalyRecord> for AnomalyEvent {
    type Error = CoreError;

    fn try_from(record: AnomalyRecord) -> Result<Self, Self::Error> {
        let origin = match (record.detection_config_id, record.function_id) {
            (Some(id), None) => Origin::CurrentDetector(id),
            (None, Some(id)) => Origin::LegacyFunction(id),
            (Some(_), Some(_)) => {
                return Err(CoreError::MalformedAnomaly {
                    id: record.id,
                    reason: "both detectionConfigId and functionId are set".to_string(),
                })
            }
            (None, None) => {
                return Err(CoreError::MalformedAnomaly {
                    id: record.id,
                    reason: "no origin: neither detectionConfigId nor functionId is set".to_string(),
                })
            }
        };

        let mut event = AnomalyEvent::new(record.id, origin, record.start_time, record.end_time)?;
        event.score = record.score;
        event.metric = record.metric;
        Ok(event)
    }
}

impl From<&AnomalyEvent> for AnomalyRecord {
    fn from(event: &AnomalyEvent) -> Self {
        let (detection_config_id, function_id) = match event.origin {
            Origin::CurrentDetector(id) => (Some(id), None),
            Origin::LegacyFunction(id) => (None, Some(id)),
        };
        Self {
            id: event.id,
            detection_config_id,
            function_id,
            start_time: event.window_start,
            end_time: event.window_end,
            score: event.score,
            metric: event.metric.clone(),
        }
    }
}

/// Parse a JSON array of [`AnomalyRecord`]s.
pub fn parse_records(json: &str) -> Result<Vec<AnomalyRecord>, CoreError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, detection: Option<u64>, function: Option<u64>) -> AnomalyRecord {
        AnomalyRecord {
            id: AnomalyId(id),
            detection_config_id: detection,
            function_id: function,
            start_time: 0,
            end_time: 1000,
            score: 0.0,
            metric: None,
        }
    }

    #[test]
    fn record_with_detection_config_is_current() {
        let event = AnomalyEvent::try_from(record(1, Some(1001), None)).unwrap();
        assert_eq!(event.origin, Origin::CurrentDetector(1001));
        assert!(!event.origin.is_legacy());
    }

    #[test]
    fn record_with_function_id_is_legacy() {
        let event = AnomalyEvent::try_from(record(1, None, Some(1002))).unwrap();
        assert_eq!(event.origin, Origin::LegacyFunction(1002));
        assert_eq!(event.origin.id(), 1002);
    }

    #[test]
    fn record_without_origin_is_malformed() {
        let err = AnomalyEvent::try_from(record(7, None, None)).unwrap_err();
        assert!(matches!(err, CoreError::MalformedAnomaly { id: AnomalyId(7), .. }));
    }

    #[test]
    fn record_with_both_origins_is_malformed() {
        let err = AnomalyEvent::try_from(record(7, Some(1), Some(2))).unwrap_err();
        assert!(matches!(err, CoreError::MalformedAnomaly { .. }));
    }

    #[test]
    fn empty_window_is_rejected() {
        let err = AnomalyEvent::new(AnomalyId(1), Origin::CurrentDetector(1), 500, 500).unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn identity_is_by_id() {
        let a = AnomalyEvent::new(AnomalyId(1), Origin::CurrentDetector(1), 0, 10).unwrap();
        let b = AnomalyEvent::new(AnomalyId(1), Origin::LegacyFunction(9), 5, 20)
            .unwrap()
            .with_score(0.9);
        assert_eq!(a, b);

        let set: std::collections::BTreeSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn parse_records_reads_camel_case_json() {
        let json = r#"[
            {"id": 1, "detectionConfigId": 1001, "startTime": 0, "endTime": 1000},
            {"id": 2, "functionId": 1002, "startTime": 1100, "endTime": 2000, "score": 0.4, "metric": "page_views"}
        ]"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].detection_config_id, Some(1001));
        assert_eq!(records[1].function_id, Some(1002));
        assert_eq!(records[1].metric.as_deref(), Some("page_views"));
    }

    #[test]
    fn record_conversion_keeps_payload() {
        let event = AnomalyEvent::new(AnomalyId(3), Origin::LegacyFunction(4), 10, 20)
            .unwrap()
            .with_score(0.5)
            .with_metric("clicks");
        let record = AnomalyRecord::from(&event);
        assert_eq!(record.function_id, Some(4));
        assert_eq!(record.detection_config_id, None);
        let back = AnomalyEvent::try_from(record).unwrap();
        assert_eq!(back.metric.as_deref(), Some("clicks"));
        assert_eq!(back.window_end, 20);
    }
}
