//! Read-only access to the anomaly population.
//!
//! The engine calls [`AnomalySource::query`] once per run. Implementations may
//! push the identifier predicate down or return a broader set; the engine
//! re-applies both the predicate and the time bound either way.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;

use vigil_core::{
    parse_records, AnomalyEvent, AnomalyId, AnomalyRecord, CoreError, DetectorId, Origin, Timestamp,
};

use crate::error::{AlertError, Result};
use crate::schema::SubscriptionMode;

/// Which anomalies a subscription is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPredicate {
    pub mode: SubscriptionMode,
    pub ids: BTreeSet<DetectorId>,
}

impl IdPredicate {
    pub fn new(mode: SubscriptionMode, ids: BTreeSet<DetectorId>) -> Self {
        Self { mode, ids }
    }

    pub fn matches(&self, origin: &Origin) -> bool {
        self.mode.accepts(origin) && self.ids.contains(&origin.id())
    }
}

/// Query interface over known anomalies. Must tolerate concurrent readers.
pub trait AnomalySource: Send + Sync {
    /// Anomalies with `window_start <= upper`, optionally narrowed by `predicate`.
    fn query(&self, predicate: &IdPredicate, upper: Timestamp) -> Result<Vec<AnomalyEvent>>;
}

/// Convert raw records, failing on the first one that violates the data
/// model, and keep those matching `predicate` that started by `upper`.
///
/// An id seen twice with identical payloads is kept once. An id seen twice
/// with different payloads fails the query.
fn select_records<'a, I>(records: I, predicate: &IdPredicate, upper: Timestamp) -> Result<Vec<AnomalyEvent>>
where
    I: IntoIterator<Item = &'a AnomalyRecord>,
{
    let mut seen: HashMap<AnomalyId, &AnomalyRecord> = HashMap::new();
    let mut out = Vec::new();
    for record in records {
        if let Some(previous) = seen.insert(record.id, record) {
            if previous != record {
                return Err(CoreError::MalformedAnomaly {
                    id: record.id,
                    reason: "id appears more than once with different contents".to_string(),
                }
                .into());
            }
            continue;
        }
        let event = AnomalyEvent::try_from(record.clone())?;
        if event.window_start <= upper && predicate.matches(&event.origin) {
            out.push(event);
        }
    }
    Ok(out)
}

// ── In-memory ───────────────────────────────────────────────────────

/// Population held in memory as raw records.
///
/// Records are validated on every query so a corrupt entry fails the run
/// instead of being skipped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnomalySource {
    records: Vec<AnomalyRecord>,
}

impl InMemoryAnomalySource {
    pub fn new(anomalies: &[AnomalyEvent]) -> Self {
        Self {
            records: anomalies.iter().map(AnomalyRecord::from).collect(),
        }
    }

    pub fn from_records(records: Vec<AnomalyRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, anomaly: &AnomalyEvent) {
        self.records.push(AnomalyRecord::from(anomaly));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl AnomalySource for InMemoryAnomalySource {
    fn query(&self, predicate: &IdPredicate, upper: Timestamp) -> Result<Vec<AnomalyEvent>> {
        select_records(&self.records, predicate, upper)
    }
}

// ── JSON file ───────────────────────────────────────────────────────

/// Population read from a JSON array of [`AnomalyRecord`]s on every query.
#[derive(Debug, Clone)]
pub struct JsonFileAnomalySource {
    path: PathBuf,
}

impl JsonFileAnomalySource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl AnomalySource for JsonFileAnomalySource {
    fn query(&self, predicate: &IdPredicate, upper: Timestamp) -> Result<Vec<AnomalyEvent>> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            AlertError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let records = parse_records(&contents).map_err(|e| {
            AlertError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        select_records(&records, predicate, upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, detection: Option<u64>, function: Option<u64>, start: i64, end: i64) -> AnomalyRecord {
        AnomalyRecord {
            id: AnomalyId(id),
            detection_config_id: detection,
            function_id: function,
            start_time: start,
            end_time: end,
            score: 0.0,
            metric: None,
        }
    }

    fn predicate(mode: SubscriptionMode, ids: &[u64]) -> IdPredicate {
        IdPredicate::new(mode, ids.iter().copied().collect())
    }

    #[test]
    fn predicate_respects_mode_and_ids() {
        let p = predicate(SubscriptionMode::CurrentOnly, &[1001]);
        assert!(p.matches(&Origin::CurrentDetector(1001)));
        assert!(!p.matches(&Origin::CurrentDetector(1003)));
        assert!(!p.matches(&Origin::LegacyFunction(1001)));
    }

    #[test]
    fn in_memory_pushes_down_predicate_and_bound() {
        let source = InMemoryAnomalySource::from_records(vec![
            record(1, Some(1001), None, 0, 1000),
            record(2, Some(1001), None, 3000, 4000),
            record(3, None, Some(1001), 0, 1000),
            record(4, Some(1003), None, 0, 1000),
        ]);
        let got = source
            .query(&predicate(SubscriptionMode::CurrentOnly, &[1001]), 2500)
            .unwrap();
        let ids: Vec<_> = got.iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn upper_bound_is_inclusive() {
        let source = InMemoryAnomalySource::from_records(vec![record(1, Some(1), None, 2500, 2600)]);
        let got = source
            .query(&predicate(SubscriptionMode::CurrentOnly, &[1]), 2500)
            .unwrap();
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn malformed_record_fails_the_query() {
        let source = InMemoryAnomalySource::from_records(vec![
            record(1, Some(1), None, 0, 10),
            record(2, None, None, 0, 10),
        ]);
        let err = source
            .query(&predicate(SubscriptionMode::CurrentOnly, &[1]), 100)
            .unwrap_err();
        assert!(matches!(err, AlertError::MalformedAnomaly(_)));
    }

    #[test]
    fn conflicting_duplicate_ids_fail_the_query() {
        let source = InMemoryAnomalySource::from_records(vec![
            record(1, Some(1001), None, 0, 1000),
            record(1, Some(1002), None, 0, 9000),
        ]);
        let err = source
            .query(&predicate(SubscriptionMode::CurrentOnly, &[1001, 1002]), 10_000)
            .unwrap_err();
        assert!(matches!(
            err,
            AlertError::MalformedAnomaly(CoreError::MalformedAnomaly { id: AnomalyId(1), .. })
        ));
    }

    #[test]
    fn identical_duplicates_are_kept_once() {
        let source = InMemoryAnomalySource::from_records(vec![
            record(1, Some(1001), None, 0, 1000),
            record(1, Some(1001), None, 0, 1000),
        ]);
        let got = source
            .query(&predicate(SubscriptionMode::CurrentOnly, &[1001]), 10_000)
            .unwrap();
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn json_file_source_reads_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anomalies.json");
        fs::write(
            &path,
            r#"[{"id": 1, "functionId": 1002, "startTime": 0, "endTime": 1000}]"#,
        )
        .unwrap();

        let source = JsonFileAnomalySource::new(path);
        let got = source
            .query(&predicate(SubscriptionMode::LegacyOnly, &[1002]), 2500)
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].origin, Origin::LegacyFunction(1002));
    }

    #[test]
    fn missing_json_file_is_source_unavailable() {
        let source = JsonFileAnomalySource::new(PathBuf::from("/nonexistent/anomalies.json"));
        let err = source
            .query(&predicate(SubscriptionMode::CurrentOnly, &[1]), 0)
            .unwrap_err();
        assert!(matches!(err, AlertError::SourceUnavailable(_)));
    }
}
