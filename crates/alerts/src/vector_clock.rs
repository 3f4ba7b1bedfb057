//! Per-detector notification watermarks.
//!
//! A [`VectorClock`] maps each detector to the time boundary up to which its
//! anomalies have already been notified. The selection engine only reads a
//! clock and proposes an advanced copy; the caller commits it after delivery.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vigil_core::{AnomalyEvent, DetectorId, Origin, Timestamp};

/// Watermarks keyed by detector, one map per pipeline generation so a
/// detection-config id never aliases a legacy function id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorClock {
    /// Fallback boundary for detectors with no entry of their own.
    #[serde(default)]
    pub high_water_mark: Timestamp,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    current: BTreeMap<DetectorId, Timestamp>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    legacy: BTreeMap<DetectorId, Timestamp>,
}

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_high_water_mark(high_water_mark: Timestamp) -> Self {
        Self {
            high_water_mark,
            ..Self::default()
        }
    }

    fn entries(&self, origin: &Origin) -> &BTreeMap<DetectorId, Timestamp> {
        match origin {
            Origin::CurrentDetector(_) => &self.current,
            Origin::LegacyFunction(_) => &self.legacy,
        }
    }

    fn entries_mut(&mut self, origin: &Origin) -> &mut BTreeMap<DetectorId, Timestamp> {
        match origin {
            Origin::CurrentDetector(_) => &mut self.current,
            Origin::LegacyFunction(_) => &mut self.legacy,
        }
    }

    /// The detector's own entry, without the high-water-mark fallback.
    pub fn entry(&self, origin: &Origin) -> Option<Timestamp> {
        self.entries(origin).get(&origin.id()).copied()
    }

    /// Effective boundary for a detector. When both a specific entry and the
    /// high-water mark exist the larger one wins.
    pub fn watermark(&self, origin: &Origin) -> Timestamp {
        match self.entry(origin) {
            Some(ts) => ts.max(self.high_water_mark),
            None => self.high_water_mark,
        }
    }

    /// Whether an anomaly lies entirely before its detector's watermark.
    pub fn covers(&self, anomaly: &AnomalyEvent) -> bool {
        anomaly.window_end <= self.watermark(&anomaly.origin)
    }

    /// Move a detector's entry forward to `to`. Never moves backwards.
    pub fn advance(&mut self, origin: Origin, to: Timestamp) {
        let next = self.watermark(&origin).max(to);
        self.entries_mut(&origin).insert(origin.id(), next);
    }

    /// Copy of this clock advanced past every given anomaly. Detectors with
    /// no anomaly in the batch keep their current value.
    pub fn propose<'a, I>(&self, anomalies: I) -> VectorClock
    where
        I: IntoIterator<Item = &'a AnomalyEvent>,
    {
        let mut proposed = self.clone();
        for anomaly in anomalies {
            proposed.advance(anomaly.origin, anomaly.window_end);
        }
        proposed
    }

    /// Pointwise maximum with another clock.
    pub fn merge(&mut self, other: &VectorClock) {
        self.high_water_mark = self.high_water_mark.max(other.high_water_mark);
        for (origin, ts) in other.iter() {
            let slot = self.entries_mut(&origin).entry(origin.id()).or_insert(ts);
            *slot = (*slot).max(ts);
        }
    }

    /// All explicit entries, current detectors first, each in id order.
    pub fn iter(&self) -> impl Iterator<Item = (Origin, Timestamp)> + '_ {
        let current = self
            .current
            .iter()
            .map(|(id, ts)| (Origin::CurrentDetector(*id), *ts));
        let legacy = self
            .legacy
            .iter()
            .map(|(id, ts)| (Origin::LegacyFunction(*id), *ts));
        current.chain(legacy)
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        self.current.len() + self.legacy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.legacy.is_empty()
    }
}
