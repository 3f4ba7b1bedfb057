//! Evaluate → dispatch → commit for one subscription at a time.
//!
//! The runner is the caller side of the selection engine. It guarantees at
//! most one evaluation in flight per subscription, reads the committed
//! watermarks at the start of the run, and commits the proposed watermarks
//! only after every delivery succeeded. Anything that fails or is cancelled
//! before the commit leaves the store untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use vigil_core::Timestamp;

use crate::dispatch::{DispatchResult, Dispatcher};
use crate::engine::SelectionEngine;
use crate::error::{AlertError, Result};
use crate::schema::AlertSubscription;
use crate::source::AnomalySource;
use crate::strategy::StrategyRegistry;
use crate::vector_clock::VectorClock;

/// Watermark persistence seam.
pub trait SubscriptionStore: Send + Sync {
    /// Current committed state of a subscription.
    fn get(&self, id: &str) -> Option<AlertSubscription>;

    /// Merge `proposed` into the subscription's stored watermarks.
    fn commit_watermarks(&self, id: &str, proposed: &VectorClock) -> Result<()>;
}

/// Outcome of one [`SubscriptionRunner::evaluate`] call.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub subscription_id: String,
    pub as_of: Timestamp,
    pub selected: usize,
    pub deliveries: Vec<DispatchResult>,
    pub committed: bool,
}

impl RunReport {
    fn idle(subscription_id: &str, as_of: Timestamp) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            as_of,
            selected: 0,
            deliveries: Vec::new(),
            committed: false,
        }
    }
}

pub struct SubscriptionRunner {
    source: Arc<dyn AnomalySource>,
    registry: Arc<StrategyRegistry>,
    dispatcher: Dispatcher,
    store: Arc<dyn SubscriptionStore>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SubscriptionRunner {
    pub fn new(
        source: Arc<dyn AnomalySource>,
        registry: Arc<StrategyRegistry>,
        dispatcher: Dispatcher,
        store: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self {
            source,
            registry,
            dispatcher,
            store,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Per-subscription run lock.
    pub(crate) fn lock_for(&self, subscription_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.in_flight.lock().expect("in-flight lock poisoned");
        Arc::clone(locks.entry(subscription_id.to_string()).or_default())
    }

    /// Run one evaluation of `subscription_id` with `as_of` as upper bound.
    ///
    /// Fails with `RunInProgress` when another evaluation of the same
    /// subscription has not finished.
    pub async fn evaluate(&self, subscription_id: &str, as_of: Timestamp) -> Result<RunReport> {
        let lock = self.lock_for(subscription_id);
        let _guard = lock
            .try_lock()
            .map_err(|_| AlertError::RunInProgress(subscription_id.to_string()))?;

        let Some(subscription) = self.store.get(subscription_id) else {
            self.in_flight
                .lock()
                .expect("in-flight lock poisoned")
                .remove(subscription_id);
            return Err(AlertError::UnknownSubscription(subscription_id.to_string()));
        };

        if !subscription.metadata.enabled {
            debug!(subscription_id, "subscription disabled, skipping");
            return Ok(RunReport::idle(subscription_id, as_of));
        }

        let result = SelectionEngine::new(self.source.as_ref(), &self.registry).run(&subscription, as_of)?;
        if result.is_empty() {
            debug!(subscription_id, as_of, "nothing new to notify");
            return Ok(RunReport::idle(subscription_id, as_of));
        }

        let deliveries = self
            .dispatcher
            .dispatch(subscription_id, &result.routed_anomalies, &subscription.recipients)
            .await;

        let failed = deliveries.iter().filter(|d| !d.success).count();
        let committed = if failed == 0 {
            self.store
                .commit_watermarks(subscription_id, &result.proposed_watermarks)?;
            true
        } else {
            warn!(
                subscription_id,
                failed,
                attempted = deliveries.len(),
                "delivery failed, watermarks not committed"
            );
            false
        };

        info!(
            subscription_id,
            as_of,
            selected = result.len(),
            deliveries = deliveries.len(),
            committed,
            "evaluation finished"
        );

        Ok(RunReport {
            subscription_id: subscription_id.to_string(),
            as_of,
            selected: result.len(),
            deliveries,
            committed,
        })
    }
}
