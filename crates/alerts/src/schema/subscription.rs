//! Subscription document, mode and schedule types.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use vigil_core::{DetectorId, Origin};

use super::SubscriptionMetadata;
use crate::vector_clock::VectorClock;

/// Document kind expected in the `kind` field.
pub const SUBSCRIPTION_KIND: &str = "AlertSubscription";

/// Channel name (`to`, `cc`, `bcc`, or custom) to destination addresses.
pub type Recipients = BTreeMap<String, BTreeSet<String>>;

/// Alert subscription as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AlertSubscription {
    pub api_version: String,
    pub kind: String,
    pub metadata: SubscriptionMetadata,
    #[serde(default)]
    pub mode: SubscriptionMode,
    #[serde(default)]
    pub subscribed_ids: BTreeSet<DetectorId>,
    /// Registered name of the legacy filter strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_filter_class_name: Option<String>,
    /// Opaque config handed to the legacy filter strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_filter_config: Option<serde_yaml::Value>,
    #[serde(default)]
    pub recipients: Recipients,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub watermarks: VectorClock,
}

impl AlertSubscription {
    /// Minimal enabled subscription with no recipients and empty watermarks.
    pub fn new(
        id: impl Into<String>,
        mode: SubscriptionMode,
        subscribed_ids: impl IntoIterator<Item = DetectorId>,
    ) -> Self {
        let id = id.into();
        Self {
            api_version: "v1".to_string(),
            kind: SUBSCRIPTION_KIND.to_string(),
            metadata: SubscriptionMetadata {
                name: id.clone(),
                id,
                description: None,
                enabled: true,
            },
            mode,
            subscribed_ids: subscribed_ids.into_iter().collect(),
            legacy_filter_class_name: None,
            legacy_filter_config: None,
            recipients: Recipients::new(),
            schedule: None,
            watermarks: VectorClock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Add addresses to a channel, creating it if needed.
    pub fn with_recipients<I, S>(mut self, channel: &str, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients
            .entry(channel.to_string())
            .or_default()
            .extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn with_legacy_filter(mut self, class_name: impl Into<String>, config: serde_yaml::Value) -> Self {
        self.legacy_filter_class_name = Some(class_name.into());
        self.legacy_filter_config = Some(config);
        self
    }

    /// Structural checks that do not need the strategy registry.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.kind != SUBSCRIPTION_KIND {
            return Err(format!(
                "expected kind '{}', found '{}'",
                SUBSCRIPTION_KIND, self.kind
            ));
        }
        if self.metadata.id.trim().is_empty() {
            return Err("metadata.id must not be empty".to_string());
        }
        for (channel, addresses) in &self.recipients {
            if channel.trim().is_empty() {
                return Err("recipient channel names must not be empty".to_string());
            }
            if addresses.iter().any(|a| a.trim().is_empty()) {
                return Err(format!("channel '{}' has a blank address", channel));
            }
        }
        if let Some(schedule) = &self.schedule {
            if schedule.cron.trim().is_empty() {
                return Err("schedule.cron must not be empty".to_string());
            }
        }
        Ok(())
    }
}

/// Which pipeline generation `subscribedIds` refers to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionMode {
    #[default]
    CurrentOnly,
    LegacyOnly,
}

impl SubscriptionMode {
    /// Whether an origin belongs to this mode's pipeline generation.
    pub fn accepts(&self, origin: &Origin) -> bool {
        matches!(
            (self, origin),
            (SubscriptionMode::CurrentOnly, Origin::CurrentDetector(_))
                | (SubscriptionMode::LegacyOnly, Origin::LegacyFunction(_))
        )
    }
}

impl std::fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionMode::CurrentOnly => write!(f, "current_only"),
            SubscriptionMode::LegacyOnly => write!(f, "legacy_only"),
        }
    }
}

/// Cron-based evaluation schedule (5-field or 6-field expression, UTC).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Schedule {
    pub cron: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_YAML: &str = r#"
apiVersion: v1
kind: AlertSubscription
metadata:
  id: growth-team
  name: Growth team alerts
mode: legacy_only
subscribedIds: [1001, 1002]
legacyFilterClassName: DummyAlertFilter
legacyFilterConfig: ""
recipients:
  to: [test@example.com, mytest@example.org]
  cc: [iamcc@host.domain]
  bcc: []
schedule:
  cron: "*/5 * * * *"
watermarks:
  highWaterMark: 0
  legacy:
    1002: 2000
"#;

    #[test]
    fn parse_legacy_subscription() {
        let sub: AlertSubscription = serde_yaml::from_str(LEGACY_YAML).unwrap();
        assert_eq!(sub.id(), "growth-team");
        assert!(sub.metadata.enabled);
        assert_eq!(sub.mode, SubscriptionMode::LegacyOnly);
        assert_eq!(sub.subscribed_ids.len(), 2);
        assert_eq!(sub.legacy_filter_class_name.as_deref(), Some("DummyAlertFilter"));
        assert_eq!(sub.recipients["to"].len(), 2);
        assert!(sub.recipients["bcc"].is_empty());
        assert_eq!(sub.schedule.as_ref().unwrap().cron, "*/5 * * * *");
        assert_eq!(sub.watermarks.entry(&Origin::LegacyFunction(1002)), Some(2000));
        assert!(sub.validate().is_ok());
    }

    #[test]
    fn mode_defaults_to_current_only() {
        let yaml = r#"
apiVersion: v1
kind: AlertSubscription
metadata: { id: s, name: S }
subscribedIds: [1]
"#;
        let sub: AlertSubscription = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(sub.mode, SubscriptionMode::CurrentOnly);
        assert!(sub.watermarks.is_empty());
        assert!(sub.recipients.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = r#"
apiVersion: v1
kind: AlertSubscription
metadata: { id: s, name: S }
onlyFetchLegacy: true
"#;
        assert!(serde_yaml::from_str::<AlertSubscription>(yaml).is_err());
    }

    #[test]
    fn mode_accepts_only_its_generation() {
        let current = SubscriptionMode::CurrentOnly;
        let legacy = SubscriptionMode::LegacyOnly;
        assert!(current.accepts(&Origin::CurrentDetector(1)));
        assert!(!current.accepts(&Origin::LegacyFunction(1)));
        assert!(legacy.accepts(&Origin::LegacyFunction(1)));
        assert!(!legacy.accepts(&Origin::CurrentDetector(1)));
    }

    #[test]
    fn validate_rejects_wrong_kind_and_blank_addresses() {
        let mut sub = AlertSubscription::new("s", SubscriptionMode::CurrentOnly, [1]);
        sub.kind = "AnomalyRule".to_string();
        assert!(sub.validate().unwrap_err().contains("expected kind"));

        let sub = AlertSubscription::new("s", SubscriptionMode::CurrentOnly, [1])
            .with_recipients("to", ["  "]);
        assert!(sub.validate().unwrap_err().contains("blank address"));
    }
}
