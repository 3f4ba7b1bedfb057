//! Strategies shipped with the crate.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vigil_core::AnomalyEvent;

use super::LegacyFilterStrategy;
use crate::error::{AlertError, Result};

/// Passes every candidate through.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFilter;

impl LegacyFilterStrategy for IdentityFilter {
    fn name(&self) -> &str {
        "identity"
    }

    fn apply(
        &self,
        candidates: BTreeSet<AnomalyEvent>,
        _config: &serde_yaml::Value,
    ) -> Result<BTreeSet<AnomalyEvent>> {
        Ok(candidates)
    }
}

/// Named placeholder for subscriptions that defer all legacy-specific logic.
/// Accepts any config and keeps every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyAlertFilter;

impl LegacyFilterStrategy for DummyAlertFilter {
    fn name(&self) -> &str {
        "dummy"
    }

    fn apply(
        &self,
        candidates: BTreeSet<AnomalyEvent>,
        _config: &serde_yaml::Value,
    ) -> Result<BTreeSet<AnomalyEvent>> {
        debug!(candidates = candidates.len(), "dummy legacy filter: passing all candidates");
        Ok(candidates)
    }
}

// ── Score threshold ─────────────────────────────────────────────────

/// Config for [`ScoreThresholdFilter`].
///
/// ```yaml
/// legacyFilterConfig:
///   minScore: 0.3
///   metricOverrides:
///     page_views: 0.8
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ScoreThresholdConfig {
    #[serde(default)]
    pub min_score: f64,
    #[serde(default)]
    pub metric_overrides: HashMap<String, f64>,
}

impl ScoreThresholdConfig {
    fn threshold_for(&self, metric: Option<&str>) -> f64 {
        metric
            .and_then(|m| self.metric_overrides.get(m).copied())
            .unwrap_or(self.min_score)
    }
}

/// Keeps anomalies whose score reaches the threshold for their metric.
/// A null config keeps everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreThresholdFilter;

impl LegacyFilterStrategy for ScoreThresholdFilter {
    fn name(&self) -> &str {
        "score_threshold"
    }

    fn apply(
        &self,
        candidates: BTreeSet<AnomalyEvent>,
        config: &serde_yaml::Value,
    ) -> Result<BTreeSet<AnomalyEvent>> {
        let config: ScoreThresholdConfig = if config.is_null() {
            ScoreThresholdConfig::default()
        } else {
            serde_yaml::from_value(config.clone()).map_err(|e| AlertError::StrategyConfig {
                strategy: self.name().to_string(),
                reason: e.to_string(),
            })?
        };

        Ok(candidates
            .into_iter()
            .filter(|a| a.score >= config.threshold_for(a.metric.as_deref()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{AnomalyId, Origin};

    fn scored(id: u64, score: f64, metric: Option<&str>) -> AnomalyEvent {
        let event = AnomalyEvent::new(AnomalyId(id), Origin::LegacyFunction(1), 0, 10)
            .unwrap()
            .with_score(score);
        match metric {
            Some(m) => event.with_metric(m),
            None => event,
        }
    }

    fn ids(set: &BTreeSet<AnomalyEvent>) -> Vec<u64> {
        set.iter().map(|a| a.id.0).collect()
    }

    #[test]
    fn identity_and_dummy_keep_everything() {
        let candidates: BTreeSet<_> = [scored(1, 0.0, None), scored(2, 1.0, None)].into();
        let config = serde_yaml::Value::String(String::new());
        assert_eq!(ids(&IdentityFilter.apply(candidates.clone(), &config).unwrap()), vec![1, 2]);
        assert_eq!(ids(&DummyAlertFilter.apply(candidates, &config).unwrap()), vec![1, 2]);
    }

    #[test]
    fn score_threshold_uses_metric_overrides() {
        let candidates: BTreeSet<_> = [
            scored(1, 0.5, None),
            scored(2, 0.2, None),
            scored(3, 0.5, Some("page_views")),
            scored(4, 0.9, Some("page_views")),
        ]
        .into();
        let config: serde_yaml::Value = serde_yaml::from_str(
            "minScore: 0.3\nmetricOverrides:\n  page_views: 0.8\n",
        )
        .unwrap();

        let kept = ScoreThresholdFilter.apply(candidates, &config).unwrap();
        assert_eq!(ids(&kept), vec![1, 4]);
    }

    #[test]
    fn score_threshold_null_config_keeps_everything() {
        let candidates: BTreeSet<_> = [scored(1, 0.0, None)].into();
        let kept = ScoreThresholdFilter
            .apply(candidates, &serde_yaml::Value::Null)
            .unwrap();
        assert_eq!(ids(&kept), vec![1]);
    }

    #[test]
    fn score_threshold_bad_config_is_an_error() {
        let config: serde_yaml::Value = serde_yaml::from_str("minScore: high").unwrap();
        let err = ScoreThresholdFilter
            .apply(BTreeSet::new(), &config)
            .unwrap_err();
        assert!(matches!(err, AlertError::StrategyConfig { .. }));
    }
}
