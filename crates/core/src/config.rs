use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub alerts: AlertsConfig,
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `VIGIL_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("VIGIL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            alerts: AlertsConfig::from_env_profiled(p),
            dispatch: DispatchConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  alerts:      subscriptions_dir={}, anomalies={}, tick={}s, hot_reload={}",
            self.alerts.subscriptions_dir.display(),
            self.alerts.anomalies_path.display(),
            self.alerts.tick_secs,
            self.alerts.hot_reload,
        );
        tracing::info!("  dispatch:    log_payloads={}", self.dispatch.log_payloads);
    }
}

// ── Alerts ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Directory holding `AlertSubscription` YAML documents.
    pub subscriptions_dir: PathBuf,
    /// JSON array of anomaly records the worker evaluates against.
    pub anomalies_path: PathBuf,
    /// Seconds between worker ticks.
    pub tick_secs: u64,
    /// Watch the subscriptions directory and reload changed documents.
    pub hot_reload: bool,
}

impl AlertsConfig {
    fn from_env_profiled(p: &str) -> Self {
        let data_dir = PathBuf::from(profiled_env_or(p, "DATA_DIR", "data"));
        let subscriptions_dir = profiled_env_opt(p, "VIGIL_SUBSCRIPTIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("subscriptions"));
        let anomalies_path = profiled_env_opt(p, "VIGIL_ANOMALIES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("anomalies.json"));
        Self {
            subscriptions_dir,
            anomalies_path,
            tick_secs: profiled_env_u64(p, "VIGIL_TICK_SECS", 60),
            hot_reload: profiled_env_bool(p, "VIGIL_HOT_RELOAD", true),
        }
    }
}

// ── Dispatch ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Log every anomaly id in a delivery, not only the batch size.
    pub log_payloads: bool,
}

impl DispatchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            log_payloads: profiled_env_bool(p, "VIGIL_LOG_PAYLOADS", false),
        }
    }
}
