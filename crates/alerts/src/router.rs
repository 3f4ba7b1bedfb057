//! Recipient channel routing.

use std::collections::{BTreeMap, BTreeSet};

use vigil_core::AnomalyEvent;

use crate::schema::Recipients;

/// Partitions selected anomalies across recipient channels.
pub trait RecipientRouter: Send + Sync {
    fn route(
        &self,
        anomalies: &BTreeSet<AnomalyEvent>,
        recipients: &Recipients,
    ) -> BTreeMap<String, BTreeSet<AnomalyEvent>>;
}

/// Sends every anomaly to every channel that has at least one address.
/// Channels without addresses are left out of the mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastRouter;

impl RecipientRouter for BroadcastRouter {
    fn route(
        &self,
        anomalies: &BTreeSet<AnomalyEvent>,
        recipients: &Recipients,
    ) -> BTreeMap<String, BTreeSet<AnomalyEvent>> {
        recipients
            .iter()
            .filter(|(_, addresses)| !addresses.is_empty())
            .map(|(channel, _)| (channel.clone(), anomalies.clone()))
            .collect()
    }
}
