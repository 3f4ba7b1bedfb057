//! Core [`SubscriptionLoader`] struct: filesystem-backed subscriptions with
//! optional hot-reload.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::error::AlertError;
use crate::runner::SubscriptionStore;
use crate::schema::AlertSubscription;
use crate::vector_clock::VectorClock;

use super::error::{LoadResult, LoadStatus, Result, SubscriptionError};
use super::watcher::handle_fs_event;

/// In-memory subscriptions plus the file each one was read from.
#[derive(Debug, Default)]
pub(super) struct Registry {
    pub(super) subscriptions: HashMap<String, AlertSubscription>,
    pub(super) paths: HashMap<String, PathBuf>,
}

impl Registry {
    pub(super) fn upsert(&mut self, subscription: AlertSubscription, path: PathBuf) {
        let id = subscription.id().to_string();
        self.paths.insert(id.clone(), path);
        self.subscriptions.insert(id, subscription);
    }

    pub(super) fn remove_by_path(&mut self, path: &Path) -> Option<AlertSubscription> {
        let id = self
            .paths
            .iter()
            .find(|(_, p)| p.as_path() == path)
            .map(|(id, _)| id.clone())?;
        self.paths.remove(&id);
        self.subscriptions.remove(&id)
    }
}

pub(super) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}

pub(super) fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Parse and validate one subscription document.
pub(super) fn parse_file(path: &Path) -> Result<AlertSubscription> {
    let contents = fs::read_to_string(path)?;
    let subscription: AlertSubscription = serde_yaml::from_str(&contents)?;
    subscription
        .validate()
        .map_err(|e| SubscriptionError::Validation(format!("{}: {}", path.display(), e)))?;
    Ok(subscription)
}

/// Write through a `.{id}.tmp` sibling renamed over `path`.
fn write_atomic(path: &Path, subscription: &AlertSubscription) -> Result<()> {
    let tmp_path = path.with_file_name(format!(".{}.tmp", subscription.id()));
    let yaml = serde_yaml::to_string(subscription)?;
    fs::write(&tmp_path, yaml)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Filesystem-backed subscription loader with optional hot-reload.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files and keeps the
/// parsed [`AlertSubscription`]s in a shared map keyed by `metadata.id`.
pub struct SubscriptionLoader {
    dir: PathBuf,
    registry: Arc<RwLock<Registry>>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl SubscriptionLoader {
    /// Create a new loader for the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(dir: PathBuf) -> Self {
        if !dir.exists() {
            if let Err(e) = fs::create_dir_all(&dir) {
                warn!(path = %dir.display(), error = %e, "failed to create subscriptions directory");
            }
        }
        Self {
            dir,
            registry: Arc::new(RwLock::new(Registry::default())),
            _watcher: None,
        }
    }

    /// Recursively scan the directory and load all YAML files.
    ///
    /// Parse errors are reported per-file but do not abort the scan. A second
    /// file claiming an id that is already loaded from another file fails.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        self.scan_dir_recursive(&self.dir, &mut results)?;
        Ok(results)
    }

    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(e) => e.map(|entry| entry.map(|e| e.path())).collect::<std::io::Result<_>>()?,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };
        // Stable order so duplicate-id resolution does not depend on readdir.
        entries.sort();

        for path in entries {
            if is_dotfile(&path) {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            if !is_yaml(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            match self.load_file(&path) {
                Ok(subscription_id) => {
                    info!(subscription_id = %subscription_id, path = %path.display(), "loaded subscription");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { subscription_id },
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load subscription file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse one file and insert it, returning the subscription id.
    pub fn load_file(&self, path: &Path) -> Result<String> {
        let subscription = parse_file(path)?;
        let id = subscription.id().to_string();

        let mut registry = self.registry.write().expect("subscription registry lock poisoned");
        if let Some(existing) = registry.paths.get(&id) {
            if existing != path {
                return Err(SubscriptionError::Validation(format!(
                    "duplicate subscription id '{}' (already loaded from {})",
                    id,
                    existing.display()
                )));
            }
        }
        registry.upsert(subscription, path.to_path_buf());
        Ok(id)
    }

    /// Start a filesystem watcher with 500ms poll interval.
    ///
    /// On file create/modify the subscription is re-parsed and upserted.
    /// On file delete it is removed from the in-memory map.
    /// Parse errors are logged as warnings; the previous version is kept.
    pub fn watch(&mut self) -> Result<()> {
        let registry = Arc::clone(&self.registry);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => handle_fs_event(&event, &registry),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        watcher.watch(&self.dir, RecursiveMode::Recursive)?;
        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.dir.display(), "watching subscriptions directory for changes (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Clone of a subscription by id.
    pub fn get(&self, id: &str) -> Option<AlertSubscription> {
        self.registry
            .read()
            .expect("subscription registry lock poisoned")
            .subscriptions
            .get(id)
            .cloned()
    }

    /// All loaded subscriptions, sorted by id.
    pub fn subscriptions(&self) -> Vec<AlertSubscription> {
        let registry = self.registry.read().expect("subscription registry lock poisoned");
        let mut subs: Vec<AlertSubscription> = registry.subscriptions.values().cloned().collect();
        subs.sort_by(|a, b| a.id().cmp(b.id()));
        subs
    }

    pub fn len(&self) -> usize {
        self.registry
            .read()
            .expect("subscription registry lock poisoned")
            .subscriptions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically write a subscription document and upsert it.
    ///
    /// Existing subscriptions are rewritten in place; new ones land in
    /// `{id}.yml`. Writes go to a `.tmp` file first and are renamed over the
    /// target so a crash never leaves a partial document.
    pub fn write_subscription(&self, subscription: &AlertSubscription) -> Result<PathBuf> {
        subscription.validate().map_err(SubscriptionError::Validation)?;
        let id = subscription.id().to_string();

        let mut registry = self.registry.write().expect("subscription registry lock poisoned");
        let final_path = registry
            .paths
            .get(&id)
            .cloned()
            .unwrap_or_else(|| self.dir.join(format!("{}.yml", id)));
        write_atomic(&final_path, subscription)?;

        info!(subscription_id = %id, path = %final_path.display(), "wrote subscription file");
        registry.upsert(subscription.clone(), final_path.clone());
        Ok(final_path)
    }

    /// Delete a subscription's file and in-memory entry.
    pub fn delete_subscription(&self, id: &str) -> Result<()> {
        let mut registry = self.registry.write().expect("subscription registry lock poisoned");
        let path = registry.paths.get(id).cloned().ok_or_else(|| {
            SubscriptionError::Validation(format!("no subscription loaded with id '{}'", id))
        })?;

        if path.exists() {
            fs::remove_file(&path)?;
        }
        registry.remove_by_path(&path);

        info!(subscription_id = %id, "deleted subscription");
        Ok(())
    }
}

impl SubscriptionStore for SubscriptionLoader {
    fn get(&self, id: &str) -> Option<AlertSubscription> {
        SubscriptionLoader::get(self, id)
    }

    /// Merge `proposed` into the document currently on disk.
    ///
    /// The file is re-read under the registry write lock so edits not yet
    /// picked up by the watcher survive; only `watermarks` changes. A
    /// subscription whose file is gone, or now carries another id, is not
    /// recreated.
    fn commit_watermarks(&self, id: &str, proposed: &VectorClock) -> crate::error::Result<()> {
        let mut registry = self.registry.write().expect("subscription registry lock poisoned");
        let path = registry
            .paths
            .get(id)
            .cloned()
            .filter(|p| p.is_file())
            .ok_or_else(|| AlertError::UnknownSubscription(id.to_string()))?;

        let mut on_disk = parse_file(&path).map_err(|e| AlertError::Store(e.to_string()))?;
        if on_disk.id() != id {
            return Err(AlertError::UnknownSubscription(id.to_string()));
        }
        on_disk.watermarks.merge(proposed);
        write_atomic(&path, &on_disk).map_err(|e| AlertError::Store(e.to_string()))?;

        info!(subscription_id = %id, path = %path.display(), "committed watermarks");
        registry.upsert(on_disk, path);
        Ok(())
    }
}
