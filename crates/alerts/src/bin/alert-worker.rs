//! alert-worker: evaluates alert subscriptions on a fixed tick.
//!
//! Each tick:
//! - syncs the scheduler with the (possibly hot-reloaded) subscriptions
//! - evaluates every due subscription in its own task
//! - delivers through the configured transports and commits watermarks
//!   back to the subscription documents

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use vigil_alerts::dispatch::{Dispatcher, LogNotifier};
use vigil_alerts::loader::{LoadStatus, SubscriptionLoader};
use vigil_alerts::runner::{SubscriptionRunner, SubscriptionStore};
use vigil_alerts::scheduler::SubscriptionScheduler;
use vigil_alerts::source::JsonFileAnomalySource;
use vigil_alerts::strategy::StrategyRegistry;
use vigil_alerts::AlertError;
use vigil_core::config::{load_dotenv, Config};

// ── CLI ─────────────────────────────────────────────────────────────

/// Alert worker: selects new anomalies per subscription and notifies recipients.
#[derive(Parser, Debug)]
#[command(name = "alert-worker", version, about)]
struct Cli {
    /// Directory of AlertSubscription YAML documents.
    #[arg(long, env = "VIGIL_SUBSCRIPTIONS_DIR")]
    subscriptions_dir: Option<PathBuf>,

    /// JSON file with the anomaly population.
    #[arg(long, env = "VIGIL_ANOMALIES_PATH")]
    anomalies: Option<PathBuf>,

    /// Seconds between ticks.
    #[arg(long, env = "VIGIL_TICK_SECS")]
    tick_secs: Option<u64>,

    /// Evaluate every enabled subscription once and exit.
    #[arg(long)]
    once: bool,

    /// Upper time bound in epoch milliseconds (defaults to now).
    #[arg(long)]
    as_of: Option<i64>,
}

// ── Tick ────────────────────────────────────────────────────────────

async fn run_tick(
    runner: &Arc<SubscriptionRunner>,
    scheduler: &mut SubscriptionScheduler,
    loader: &SubscriptionLoader,
    as_of: Option<i64>,
    force: bool,
) {
    scheduler.sync(&loader.subscriptions());

    let now = Utc::now();
    let as_of = as_of.unwrap_or_else(|| now.timestamp_millis());
    let due: Vec<String> = if force {
        loader
            .subscriptions()
            .into_iter()
            .filter(|s| s.metadata.enabled)
            .map(|s| s.id().to_string())
            .collect()
    } else {
        scheduler.due(now)
    };

    if due.is_empty() {
        return;
    }
    info!(due = due.len(), as_of, "evaluating subscriptions");

    let mut tasks = JoinSet::new();
    for id in due {
        let runner = Arc::clone(runner);
        tasks.spawn(async move {
            let outcome = runner.evaluate(&id, as_of).await;
            (id, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            // Failed evaluations and uncommitted deliveries stay due for the next tick.
            Ok((id, Ok(report))) => {
                if report.selected > 0 && !report.committed {
                    warn!(
                        subscription_id = %report.subscription_id,
                        selected = report.selected,
                        "anomalies will be retried on the next tick"
                    );
                } else {
                    scheduler.record_run(&id, now);
                }
            }
            Ok((id, Err(AlertError::RunInProgress(_)))) => {
                warn!(subscription_id = %id, "previous evaluation still running, skipped");
            }
            Ok((id, Err(e))) => {
                error!(subscription_id = %id, error = %e, "evaluation failed");
            }
            Err(e) => error!(error = %e, "evaluation task panicked"),
        }
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.subscriptions_dir {
        config.alerts.subscriptions_dir = dir;
    }
    if let Some(path) = cli.anomalies {
        config.alerts.anomalies_path = path;
    }
    if let Some(secs) = cli.tick_secs {
        config.alerts.tick_secs = secs;
    }
    config.log_summary();

    let mut loader = SubscriptionLoader::new(config.alerts.subscriptions_dir.clone());
    for result in loader.load_all()? {
        if let LoadStatus::Failed { error } = &result.status {
            warn!(path = %result.path.display(), error = %error, "subscription not loaded");
        }
    }
    info!(subscriptions = loader.len(), "subscriptions loaded");

    if config.alerts.hot_reload && !cli.once {
        loader.watch()?;
    }
    let loader = Arc::new(loader);

    let source = Arc::new(JsonFileAnomalySource::new(config.alerts.anomalies_path.clone()));
    let registry = Arc::new(StrategyRegistry::with_builtins());
    info!(strategies = ?registry.names(), "legacy filter strategies registered");

    let dispatcher = Dispatcher::new(vec![Box::new(LogNotifier::new(config.dispatch.log_payloads))]);
    let store: Arc<dyn SubscriptionStore> = loader.clone();
    let runner = Arc::new(SubscriptionRunner::new(source, registry, dispatcher, store));
    let mut scheduler = SubscriptionScheduler::new();

    if cli.once {
        run_tick(&runner, &mut scheduler, &loader, cli.as_of, true).await;
        info!("alert-worker finished single pass");
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.alerts.tick_secs.max(1)));
    info!(tick_secs = config.alerts.tick_secs, "alert-worker starting");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_tick(&runner, &mut scheduler, &loader, cli.as_of, false).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("alert-worker shutting down");
                break;
            }
        }
    }
    Ok(())
}
