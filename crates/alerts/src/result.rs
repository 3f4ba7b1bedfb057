//! Output of one evaluation run.

use std::collections::{BTreeMap, BTreeSet};

use vigil_core::AnomalyEvent;

use crate::vector_clock::VectorClock;

/// What a run selected, where it goes, and the watermarks to commit after
/// delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertFilterResult {
    /// Every anomaly selected this run.
    pub all_anomalies: BTreeSet<AnomalyEvent>,
    /// Channel name → anomalies destined for that channel's recipients.
    pub routed_anomalies: BTreeMap<String, BTreeSet<AnomalyEvent>>,
    /// Watermarks to commit once notification succeeded.
    pub proposed_watermarks: VectorClock,
}

impl AlertFilterResult {
    pub fn is_empty(&self) -> bool {
        self.all_anomalies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.all_anomalies.len()
    }
}
