//! Notification transports and the dispatcher that feeds them.
//!
//! The dispatcher hands each routed channel's batch to every configured
//! transport. Individual transport failures don't block other deliveries;
//! the caller decides from the results whether watermarks may be committed.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use vigil_core::AnomalyEvent;

use crate::schema::Recipients;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Transport failed: {0}")]
    Transport(String),
}

/// One channel's batch for one subscription.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Delivery {
    pub subscription_id: String,
    pub channel: String,
    pub addresses: Vec<String>,
    pub anomalies: Vec<AnomalyEvent>,
}

/// Trait for notification transport implementations (email, webhook, queue).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one batch.
    async fn send(&self, delivery: &Delivery) -> Result<(), NotifyError>;

    /// Human-readable name for this transport (e.g., "log", "webhook").
    fn transport_name(&self) -> &str;
}

/// Result of one delivery attempt.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub transport: String,
    pub channel: String,
    pub anomaly_count: usize,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Sends routed anomalies through a fixed set of transports.
pub struct Dispatcher {
    transports: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(transports: Vec<Box<dyn Notifier>>) -> Self {
        Self { transports }
    }

    /// Dispatcher with no transports; every dispatch is a no-op.
    pub fn empty() -> Self {
        Self {
            transports: Vec::new(),
        }
    }

    pub fn add_transport(&mut self, transport: Box<dyn Notifier>) {
        self.transports.push(transport);
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    /// Deliver every non-empty routed batch through every transport.
    pub async fn dispatch(
        &self,
        subscription_id: &str,
        routed: &BTreeMap<String, BTreeSet<AnomalyEvent>>,
        recipients: &Recipients,
    ) -> Vec<DispatchResult> {
        if self.transports.is_empty() {
            tracing::debug!(subscription_id, "No notification transports configured");
            return Vec::new();
        }

        let mut results = Vec::new();

        for (channel, anomalies) in routed {
            if anomalies.is_empty() {
                continue;
            }
            let delivery = Delivery {
                subscription_id: subscription_id.to_string(),
                channel: channel.clone(),
                addresses: recipients
                    .get(channel)
                    .map(|a| a.iter().cloned().collect())
                    .unwrap_or_default(),
                anomalies: anomalies.iter().cloned().collect(),
            };

            for transport in &self.transports {
                let start = Instant::now();
                let result = transport.send(&delivery).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                let (success, error) = match result {
                    Ok(()) => {
                        tracing::info!(
                            subscription_id,
                            channel = %channel,
                            transport = transport.transport_name(),
                            anomalies = anomalies.len(),
                            duration_ms,
                            "Notification delivered"
                        );
                        (true, None)
                    }
                    Err(e) => {
                        tracing::warn!(
                            subscription_id,
                            channel = %channel,
                            transport = transport.transport_name(),
                            error = %e,
                            duration_ms,
                            "Notification delivery failed"
                        );
                        (false, Some(e.to_string()))
                    }
                };

                results.push(DispatchResult {
                    transport: transport.transport_name().to_string(),
                    channel: channel.clone(),
                    anomaly_count: anomalies.len(),
                    success,
                    error,
                    duration_ms,
                });
            }
        }

        results
    }
}

/// Transport that writes deliveries to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    log_payloads: bool,
}

impl LogNotifier {
    pub fn new(log_payloads: bool) -> Self {
        Self { log_payloads }
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, delivery: &Delivery) -> Result<(), NotifyError> {
        if self.log_payloads {
            let payload = serde_json::to_string(&delivery.anomalies)
                .map_err(|e| NotifyError::Transport(e.to_string()))?;
            tracing::info!(
                subscription_id = %delivery.subscription_id,
                channel = %delivery.channel,
                addresses = ?delivery.addresses,
                payload = %payload,
                "alert"
            );
        } else {
            tracing::info!(
                subscription_id = %delivery.subscription_id,
                channel = %delivery.channel,
                addresses = ?delivery.addresses,
                anomalies = delivery.anomalies.len(),
                "alert"
            );
        }
        Ok(())
    }

    fn transport_name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use vigil_core::{AnomalyId, Origin};

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _delivery: &Delivery) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Transport("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn transport_name(&self) -> &str {
            &self.name
        }
    }

    fn routed(channels: &[&str]) -> BTreeMap<String, BTreeSet<AnomalyEvent>> {
        let batch: BTreeSet<_> =
            [AnomalyEvent::new(AnomalyId(1), Origin::CurrentDetector(1), 0, 10).unwrap()].into();
        channels.iter().map(|c| (c.to_string(), batch.clone())).collect()
    }

    fn recipients(channels: &[&str]) -> Recipients {
        channels
            .iter()
            .map(|c| (c.to_string(), [format!("{c}@example.com")].into()))
            .collect()
    }

    #[tokio::test]
    async fn dispatch_every_channel_through_every_transport() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));

        let dispatcher = Dispatcher::new(vec![
            Box::new(MockNotifier {
                name: "a".to_string(),
                send_count: count_a.clone(),
                should_fail: false,
            }),
            Box::new(MockNotifier {
                name: "b".to_string(),
                send_count: count_b.clone(),
                should_fail: false,
            }),
        ]);

        let results = dispatcher
            .dispatch("sub-1", &routed(&["to", "cc"]), &recipients(&["to", "cc"]))
            .await;
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(count_a.load(Ordering::SeqCst), 2);
        assert_eq!(count_b.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let count = Arc::new(AtomicUsize::new(0));

        let dispatcher = Dispatcher::new(vec![
            Box::new(MockNotifier {
                name: "fail".to_string(),
                send_count: Arc::new(AtomicUsize::new(0)),
                should_fail: true,
            }),
            Box::new(MockNotifier {
                name: "ok".to_string(),
                send_count: count.clone(),
                should_fail: false,
            }),
        ]);

        let results = dispatcher
            .dispatch("sub-1", &routed(&["to"]), &recipients(&["to"]))
            .await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_batches_are_skipped() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(vec![Box::new(MockNotifier {
            name: "a".to_string(),
            send_count: count.clone(),
            should_fail: false,
        })]);

        let routed: BTreeMap<String, BTreeSet<AnomalyEvent>> =
            [("to".to_string(), BTreeSet::new())].into();
        let results = dispatcher.dispatch("sub-1", &routed, &recipients(&["to"])).await;
        assert!(results.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let dispatcher = Dispatcher::new(vec![Box::new(LogNotifier::new(true))]);
        let results = dispatcher
            .dispatch("sub-1", &routed(&["to"]), &recipients(&["to"]))
            .await;
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].transport, "log");
    }
}
