//! Overrides directory watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Watcher, RecursiveMode, Event, RecommendedWatcher, Config};
use tokio::sync::mpsc;
use crate::registry::{RegistryLoader, SharedRegistry};

/// Quiet period after the last change before rules are rebuilt.
const DEBOUNCE: Duration = Duration::from_millis(150);

/// A watcher that rebuilds the rule registry when rule files change.
pub struct RulesWatcher {
    path: PathBuf,
    loader: RegistryLoader,
    registry: SharedRegistry,
}

impl RulesWatcher {
    /// Create a new RulesWatcher for `path`.
    pub fn new(path: &Path, loader: RegistryLoader, registry: SharedRegistry) -> Self {
        Self {
            path: path.to_path_buf(),
            loader,
            registry,
        }
    }

    /// Start watching. Must be called inside a Tokio runtime.
    ///
    /// The returned watcher stops when dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Rules watcher started");

        tokio::spawn(reload_loop(rx, self.loader, self.registry));
        Ok(watcher)
    }
}

async fn reload_loop(
    mut changes: mpsc::UnboundedReceiver<()>,
    loader: RegistryLoader,
    registry: SharedRegistry,
) {
    while changes.recv().await.is_some() {
        // Coalesce bursts of events from a single save.
        loop {
            match tokio::time::timeout(DEBOUNCE, changes.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        tracing::info!("Rule files changed, reloading...");
        let next = loader.clone();
        match tokio::task::spawn_blocking(move || next.load()).await {
            Ok(new_registry) => {
                registry.replace(new_registry);
            }
            Err(e) => {
                tracing::error!("Failed to reload rules: {}. Keeping current registry.", e);
            }
        }
    }
}
