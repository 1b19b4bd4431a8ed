//! File system watching.
//!
//! This module provides:
//! - Path subscriptions using notify-rs
//! - Gitignore-style exclude and extension filtering
//! - Re-subscription of paths that editors replace via unlink and recreate

#[allow(clippy::module_inception)]
mod watcher;

mod events;
mod filter;

use std::path::Path;

pub use events::{ChangeEvent, ChangeOp, WatchMessage};
pub use filter::PathFilter;
pub use watcher::FileWatcher;

use crate::Result;

/// A source of change events the orchestrator can drain.
#[allow(async_fn_in_trait)]
pub trait WatchSource {
    /// Wait for the next event or watch-layer error.
    ///
    /// Returns `None` once the source is closed.
    async fn next(&mut self) -> Option<WatchMessage>;

    /// Unsubscribe and immediately re-subscribe `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the new subscription cannot be established.
    fn resubscribe(&mut self, path: &Path) -> Result<()>;
}
