//! File system event types and handling.

#![allow(clippy::missing_const_for_fn)]

use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind};

use crate::error::WatcherError;

/// Operation reported for a changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOp {
    /// Path was created.
    Create,
    /// File content changed.
    Write,
    /// Path was removed.
    Remove,
    /// Path was renamed.
    Rename,
    /// Anything else: access, metadata, backend-specific kinds.
    Other,
}

impl ChangeOp {
    /// Short upper-case label used in log output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Write => "WRITE",
            Self::Remove => "REMOVE",
            Self::Rename => "RENAME",
            Self::Other => "OTHER",
        }
    }
}

impl From<&EventKind> for ChangeOp {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => Self::Create,
            EventKind::Modify(ModifyKind::Name(_)) => Self::Rename,
            EventKind::Modify(ModifyKind::Metadata(_)) => Self::Other,
            EventKind::Modify(_) => Self::Write,
            EventKind::Remove(_) => Self::Remove,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Self::Other,
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single change on a single path, in the order the OS reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Affected path.
    pub path: PathBuf,
    /// What happened to it.
    pub op: ChangeOp,
}

impl ChangeEvent {
    /// Create a new change event.
    pub fn new(path: impl Into<PathBuf>, op: ChangeOp) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }

    /// Get the path associated with this event.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Split a backend event into one change per path.
    #[must_use]
    pub fn from_notify(event: notify::Event) -> Vec<Self> {
        let op = ChangeOp::from(&event.kind);
        event
            .paths
            .into_iter()
            .map(|path| Self { path, op })
            .collect()
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.path, self.op)
    }
}

/// One item from the watcher: either a change or a watch-layer error.
#[derive(Debug)]
pub enum WatchMessage {
    /// A filesystem change.
    Event(ChangeEvent),
    /// A non-fatal error from the watch layer.
    Error(WatcherError),
}
