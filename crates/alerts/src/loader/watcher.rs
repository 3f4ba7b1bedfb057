//! Filesystem event handler for the notify watcher (hot-reload).

use std::sync::{Arc, RwLock};

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tracing::{info, warn};

use super::core::{is_dotfile, is_yaml, parse_file, Registry};

/// Handle a single filesystem event from the notify watcher.
pub(super) fn handle_fs_event(event: &Event, registry: &Arc<RwLock<Registry>>) {
    for path in &event.paths {
        // Dotfiles include our own .tmp files.
        if !is_yaml(path) || is_dotfile(path) {
            continue;
        }

        match &event.kind {
            EventKind::Create(CreateKind::File)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_)) => {
                if !path.exists() {
                    // Rename away from this path.
                    remove_by_path(registry, path);
                    continue;
                }
                match parse_file(path) {
                    Ok(subscription) => {
                        let id = subscription.id().to_string();
                        let mut guard = registry.write().expect("subscription registry lock poisoned");
                        let duplicate_of = guard.paths.get(&id).filter(|p| *p != path).cloned();
                        match duplicate_of {
                            Some(existing) => {
                                warn!(
                                    subscription_id = %id,
                                    path = %path.display(),
                                    existing = %existing.display(),
                                    "ignoring hot-reloaded subscription with duplicate id"
                                );
                            }
                            None => {
                                info!(subscription_id = %id, path = %path.display(), "hot-reloaded subscription");
                                guard.upsert(subscription, path.clone());
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to parse subscription during hot-reload, keeping previous version"
                        );
                    }
                }
            }
            EventKind::Remove(RemoveKind::File) => remove_by_path(registry, path),
            _ => {}
        }
    }
}

fn remove_by_path(registry: &Arc<RwLock<Registry>>, path: &std::path::Path) {
    let removed = registry
        .write()
        .expect("subscription registry lock poisoned")
        .remove_by_path(path);
    if let Some(subscription) = removed {
        info!(subscription_id = %subscription.id(), path = %path.display(), "removed subscription after file deletion");
    }
}
