//! Snapshot file watcher
//!
//! Stands in for the device-management transport: the managed
//! configuration snapshot lives in a YAML mapping on disk and every
//! modification is delivered as a configuration-changed notification.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::ConfigSnapshot;

/// Debounce between a file modification and the reload attempt.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Load a snapshot mapping from a YAML file.
pub async fn load_snapshot(path: &str) -> Result<ConfigSnapshot> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read snapshot file: {}", path))?;

    let snapshot: ConfigSnapshot = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse snapshot file: {}", path))?;

    Ok(snapshot)
}

/// Snapshot watcher that monitors file changes and delivers fresh snapshots
pub struct SnapshotWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<ConfigSnapshot>,
}

impl SnapshotWatcher {
    /// Create a new watcher for the specified file and load the initial snapshot
    pub async fn new(snapshot_path: String) -> Result<(Self, ConfigSnapshot)> {
        let (tx, rx) = mpsc::channel(10);

        let initial = load_snapshot(&snapshot_path)
            .await
            .context("Failed to load initial snapshot")?;

        let path_clone = snapshot_path.clone();

        // Capture the Tokio runtime handle BEFORE creating the watcher
        // (notify callbacks run on their own OS thread, not in Tokio context)
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    // Only reload on modify events
                    if matches!(event.kind, EventKind::Modify(_)) {
                        debug!("Snapshot file modified: {:?}", event.paths);

                        let path = path_clone.clone();
                        let tx = tx.clone();

                        runtime_handle.spawn(async move {
                            // Debounce: wait a bit for file writes to complete
                            tokio::time::sleep(RELOAD_DEBOUNCE).await;

                            match load_snapshot(&path).await {
                                Ok(snapshot) => {
                                    info!("Snapshot reloaded successfully");
                                    if let Err(e) = tx.send(snapshot).await {
                                        error!("Failed to deliver snapshot update: {}", e);
                                    }
                                }
                                Err(e) => {
                                    warn!("Failed to reload snapshot (keeping old config): {}", e);
                                }
                            }
                        });
                    }
                }
                Err(e) => {
                    error!("Watch error: {}", e);
                }
            }
        })?;

        watcher
            .watch(Path::new(&snapshot_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch snapshot file: {}", snapshot_path))?;

        info!("Snapshot file watcher started for: {}", snapshot_path);

        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            initial,
        ))
    }

    /// Wait for the next snapshot delivery
    /// Returns None if the watcher has been closed
    pub async fn next_snapshot(&mut self) -> Option<ConfigSnapshot> {
        self.rx.recv().await
    }
}
