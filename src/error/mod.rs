//! Error types and Result aliases for wbs.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using wbs's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wbs operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Build command error.
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// Serve process lifecycle error.
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// Command string could not be turned into an argument vector.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to subscribe to a path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Failed to drop a subscription.
    #[error("failed to unwatch path '{path}': {reason}")]
    UnwatchFailed { path: String, reason: String },

    /// Error reported by the notification backend.
    #[error("notify error: {0}")]
    Notify(String),
}

/// Build command errors.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The build exited nonzero or could not be started.
    ///
    /// `code` is `None` when the process never ran or was killed by a signal.
    #[error("build failed ({}): {output}", exit_label(.code))]
    Failed { code: Option<i32>, output: String },
}

/// Serve process errors.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The serve command could not be started.
    #[error("failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    /// The serve process did not stop cleanly.
    #[error("failed to stop process {pid}: {reason}")]
    Stop { pid: u32, reason: String },
}

/// Command tokenizer errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Quoting or escaping is malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A backtick substitution failed.
    #[error("substitution `{command}` failed: {reason}")]
    Substitution { command: String, reason: String },
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "no exit code".to_string(), |c| format!("exit code {c}"))
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl WatcherError {
    /// Create a watch failure for `path`.
    pub fn watch_failed(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::WatchFailed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl BuildError {
    /// Create a build failure.
    pub fn failed(code: Option<i32>, output: impl Into<String>) -> Self {
        Self::Failed {
            code,
            output: output.into(),
        }
    }
}
