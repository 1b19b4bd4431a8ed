//! File system watcher using notify-rs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::events::{ChangeEvent, WatchMessage};
use super::filter::PathFilter;
use super::WatchSource;
use crate::config::Config;
use crate::error::WatcherError;
use crate::Result;

/// File system watcher.
///
/// Both channels are unbounded: if the orchestrator falls behind, events
/// queue here without limit.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<ChangeEvent>,
    error_rx: mpsc::UnboundedReceiver<WatcherError>,
    roots: HashMap<PathBuf, RecursiveMode>,
}

impl FileWatcher {
    /// Create a watcher subscribed to every path in `config.watch_paths`.
    ///
    /// # Errors
    ///
    /// Returns an error if any path does not exist or cannot be watched.
    pub fn new(config: &Config) -> Result<Self> {
        let base = std::env::current_dir()?
            .canonicalize()
            .map_err(|e| WatcherError::watch_failed(Path::new("."), e))?;
        let mut filter = PathFilter::with_patterns(&base, &config.exclude, &config.extensions)?;

        let mut canonical = Vec::with_capacity(config.watch_paths.len());
        for path in &config.watch_paths {
            let path = path
                .canonicalize()
                .map_err(|e| WatcherError::watch_failed(path, e))?;
            filter.add_root(&path);
            canonical.push(path);
        }

        let mut watcher = Self::with_filter(filter)?;
        for path in &canonical {
            watcher.watch(path)?;
        }

        Ok(watcher)
    }

    /// Create a watcher with no subscriptions yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification backend cannot be initialized.
    pub fn with_filter(filter: PathFilter) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    for change in ChangeEvent::from_notify(event) {
                        if filter.allows(&change.path) {
                            let _ = event_tx.send(change);
                        } else {
                            tracing::trace!(path = %change.path.display(), op = %change.op, "Filtered event");
                        }
                    }
                }
                Err(e) => {
                    let _ = error_tx.send(WatcherError::Notify(e.to_string()));
                }
            },
        )
        .map_err(|e| WatcherError::WatchFailed {
            path: "init".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            watcher,
            event_rx,
            error_rx,
            roots: HashMap::new(),
        })
    }

    /// Subscribe to a path. Directories are watched recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist or cannot be watched.
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(WatcherError::watch_failed(&path, "path does not exist").into());
        }

        let mode = if path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        self.watcher
            .watch(&path, mode)
            .map_err(|e| WatcherError::watch_failed(&path, e))?;

        tracing::info!(path = %path.display(), recursive = path.is_dir(), "Watching path");
        self.roots.insert(path, mode);

        Ok(())
    }

    /// Drop the subscription on a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses to unwatch.
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.roots.remove(path);

        self.watcher
            .unwatch(path)
            .map_err(|e| WatcherError::UnwatchFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %path.display(), "Stopped watching path");
        Ok(())
    }

    /// Get the list of subscribed paths.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.roots.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn covering_root(&self, path: &Path) -> Option<&PathBuf> {
        self.roots
            .iter()
            .find(|(root, mode)| {
                **mode == RecursiveMode::Recursive && path.starts_with(root) && path != *root
            })
            .map(|(root, _)| root)
    }
}

impl WatchSource for FileWatcher {
    async fn next(&mut self) -> Option<WatchMessage> {
        tokio::select! {
            Some(event) = self.event_rx.recv() => Some(WatchMessage::Event(event)),
            Some(err) = self.error_rx.recv() => Some(WatchMessage::Error(err)),
            else => None,
        }
    }

    /// Re-establish the subscription for a removed path.
    ///
    /// A path beneath a recursively watched root is already covered by that
    /// root, so it only has to exist again. Anything else is unwatched and
    /// watched afresh; an unwatch failure is logged and does not stop the
    /// new subscription attempt.
    fn resubscribe(&mut self, path: &Path) -> Result<()> {
        if let Some(root) = self.covering_root(path) {
            tracing::debug!(path = %path.display(), root = %root.display(), "Path covered by recursive root");
            if path.exists() {
                return Ok(());
            }
            return Err(WatcherError::watch_failed(path, "path does not exist").into());
        }

        if let Err(e) = self.unwatch(path) {
            tracing::warn!(error = %e, "Unwatch before re-subscribe failed");
        }
        self.watch(path)
    }
}
