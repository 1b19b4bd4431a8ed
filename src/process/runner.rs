//! Supervision of the serve subprocess.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};

use super::command::CommandTokenizer;
use super::ServeStep;
use crate::config::Config;
use crate::error::ProcessError;
use crate::Result;

/// A live serve subprocess.
///
/// Owned by the [`Runner`]; dropping it kills the process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: u32,
    started_at: Instant,
}

impl ProcessHandle {
    /// OS process identifier.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Time since the process was started.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Check liveness, reaping the process if it has exited.
    fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::info!(pid = self.pid, %status, "Server exited on its own");
                false
            }
            Err(e) => {
                tracing::warn!(pid = self.pid, error = %e, "Failed to poll server status");
                false
            }
        }
    }
}

/// Starts and stops the serve command, keeping at most one process alive.
#[derive(Debug)]
pub struct Runner {
    command: String,
    tokenizer: CommandTokenizer,
    grace: Duration,
    handle: Option<ProcessHandle>,
}

impl Runner {
    /// Create a runner for `config.serve_command`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command string is malformed.
    pub fn new(config: &Config) -> Result<Self> {
        let tokenizer = CommandTokenizer::from_config(&config.tokenizer);
        tokenizer.validate(&config.serve_command)?;

        Ok(Self {
            command: config.serve_command.clone(),
            tokenizer,
            grace: config.stop_grace(),
            handle: None,
        })
    }

    /// Whether a server process is currently alive.
    ///
    /// A process that exited on its own is reaped and forgotten here.
    pub fn is_running(&mut self) -> bool {
        let alive = self.handle.as_mut().is_some_and(ProcessHandle::is_alive);
        if !alive {
            self.handle = None;
        }
        alive
    }

    /// PID of the tracked process, if any.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(ProcessHandle::pid)
    }

    /// Start the server unless one is already running.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] if the command cannot be tokenized or started.
    pub async fn serve(&mut self) -> Result<()> {
        if self.is_running() {
            tracing::debug!(pid = ?self.pid(), "Server already running");
            return Ok(());
        }

        let argv = self
            .tokenizer
            .tokenize(&self.command)
            .await
            .map_err(|e| self.spawn_error(e))?;

        let Some((program, args)) = argv.split_first() else {
            tracing::debug!("No serve command configured, nothing to start");
            return Ok(());
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let pid = child.id().unwrap_or_default();
        tracing::info!(pid, command = %self.command, "Server started");

        self.handle = Some(ProcessHandle {
            child,
            pid,
            started_at: Instant::now(),
        });
        Ok(())
    }

    /// Terminate the server and wait for it to be reaped.
    ///
    /// The handle is cleared whether or not the process exits in time.
    /// The kill cannot be caught, so the grace period only bounds how long
    /// the reap may take; the server gets no chance to shut down cleanly.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Stop`] if the process cannot be signalled or
    /// does not exit within the grace period.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };
        let pid = handle.pid;

        if !handle.is_alive() {
            return Ok(());
        }

        let uptime_ms = u64::try_from(handle.uptime().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(pid, uptime_ms, "Stopping server");

        if let Err(e) = handle.child.start_kill() {
            return Err(ProcessError::Stop {
                pid,
                reason: e.to_string(),
            }
            .into());
        }

        match tokio::time::timeout(self.grace, handle.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(pid, %status, "Server stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(ProcessError::Stop {
                pid,
                reason: e.to_string(),
            }
            .into()),
            Err(_) => Err(ProcessError::Stop {
                pid,
                reason: format!("did not exit within {:?}", self.grace),
            }
            .into()),
        }
    }

    fn spawn_error(&self, reason: impl ToString) -> ProcessError {
        ProcessError::Spawn {
            command: self.command.clone(),
            reason: reason.to_string(),
        }
    }
}

impl ServeStep for Runner {
    async fn serve(&mut self) -> Result<()> {
        Self::serve(self).await
    }

    async fn stop(&mut self) -> Result<()> {
        Self::stop(self).await
    }
}
