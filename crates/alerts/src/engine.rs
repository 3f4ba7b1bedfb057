//! Selection engine: decides which anomalies a subscription notifies next.
//!
//! One run is a pure function of the anomaly population, the subscription
//! (including its committed watermarks) and `as_of`:
//!
//! 1. Match origins against `subscribedIds` in the subscription's mode.
//! 2. Keep anomalies with `window_start <= as_of`.
//! 3. Drop anomalies whose `window_end` is at or below their detector's watermark.
//! 4. In `legacy_only` mode, narrow through the configured legacy strategy.
//! 5. Propose advanced watermarks and route the survivors to channels.
//!
//! The engine never mutates the subscription; committing
//! [`AlertFilterResult::proposed_watermarks`] is the caller's job.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use vigil_core::{AnomalyEvent, Timestamp};

use crate::error::{AlertError, Result};
use crate::result::AlertFilterResult;
use crate::router::{BroadcastRouter, RecipientRouter};
use crate::schema::{AlertSubscription, SubscriptionMode};
use crate::source::{AnomalySource, IdPredicate};
use crate::strategy::{LegacyFilterStrategy, StrategyRegistry};

static BROADCAST: BroadcastRouter = BroadcastRouter;

/// Evaluates subscriptions against an [`AnomalySource`].
pub struct SelectionEngine<'a> {
    source: &'a dyn AnomalySource,
    registry: &'a StrategyRegistry,
    router: &'a dyn RecipientRouter,
}

impl<'a> SelectionEngine<'a> {
    /// Engine with broadcast routing.
    pub fn new(source: &'a dyn AnomalySource, registry: &'a StrategyRegistry) -> Self {
        Self {
            source,
            registry,
            router: &BROADCAST,
        }
    }

    pub fn with_router(mut self, router: &'a dyn RecipientRouter) -> Self {
        self.router = router;
        self
    }

    /// Run one evaluation of `subscription` with `as_of` as the upper bound
    /// on `window_start`.
    pub fn run(&self, subscription: &AlertSubscription, as_of: Timestamp) -> Result<AlertFilterResult> {
        let subscription_id = subscription.id();

        if subscription.subscribed_ids.is_empty() {
            return Err(AlertError::InvalidMode {
                subscription_id: subscription_id.to_string(),
            });
        }

        // Resolved even in current_only mode so a misnamed strategy surfaces
        // before the subscription is migrated.
        let strategy = subscription
            .legacy_filter_class_name
            .as_deref()
            .map(|name| self.registry.resolve(name))
            .transpose()?;

        let predicate = IdPredicate::new(subscription.mode, subscription.subscribed_ids.clone());
        let fetched = self.source.query(&predicate, as_of)?;
        let fetched_count = fetched.len();

        let watermarks = &subscription.watermarks;
        let candidates: BTreeSet<AnomalyEvent> = fetched
            .into_iter()
            .filter(|a| predicate.matches(&a.origin) && a.window_start <= as_of)
            .filter(|a| !watermarks.covers(a))
            .collect();

        debug!(
            subscription_id,
            mode = %subscription.mode,
            fetched = fetched_count,
            after_watermark = candidates.len(),
            "candidates filtered"
        );

        let selected = match (subscription.mode, strategy) {
            (SubscriptionMode::LegacyOnly, Some(strategy)) => {
                self.apply_strategy(subscription, strategy, candidates)?
            }
            _ => candidates,
        };

        let proposed_watermarks = watermarks.propose(&selected);
        let routed_anomalies = self.router.route(&selected, &subscription.recipients);

        info!(
            subscription_id,
            mode = %subscription.mode,
            as_of,
            selected = selected.len(),
            channels = routed_anomalies.len(),
            "subscription evaluated"
        );

        Ok(AlertFilterResult {
            all_anomalies: selected,
            routed_anomalies,
            proposed_watermarks,
        })
    }

    /// Delegate to the legacy strategy and keep only what it was given.
    fn apply_strategy(
        &self,
        subscription: &AlertSubscription,
        strategy: Arc<dyn LegacyFilterStrategy>,
        candidates: BTreeSet<AnomalyEvent>,
    ) -> Result<BTreeSet<AnomalyEvent>> {
        let config = subscription
            .legacy_filter_config
            .clone()
            .unwrap_or(serde_yaml::Value::Null);
        let narrowed = strategy.apply(candidates.clone(), &config)?;

        let before = narrowed.len();
        let kept: BTreeSet<AnomalyEvent> = narrowed
            .iter()
            .filter_map(|a| candidates.get(a).cloned())
            .collect();
        if kept.len() < before {
            warn!(
                subscription_id = subscription.id(),
                strategy = strategy.name(),
                dropped = before - kept.len(),
                "legacy strategy returned anomalies outside its input; ignoring them"
            );
        }

        debug!(
            subscription_id = subscription.id(),
            strategy = strategy.name(),
            candidates = candidates.len(),
            kept = kept.len(),
            "legacy strategy applied"
        );
        Ok(kept)
    }
}
