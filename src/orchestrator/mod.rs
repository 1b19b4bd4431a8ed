//! The watch, build, serve control loop.
//!
//! A single task drains the watcher and runs every build, stop and serve
//! call to completion before looking at the next event. That ordering is
//! what keeps at most one build and one server alive at any instant, so no
//! state here is shared or locked.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::Config;
use crate::process::{BuildStep, ServeStep};
use crate::watcher::{ChangeEvent, ChangeOp, WatchMessage, WatchSource};
use crate::{Error, Result};

/// Where the loop is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the next event.
    Idle,
    /// Stopping the server ahead of a rebuild.
    Restarting,
    /// Running the build command.
    Building,
    /// Starting the server.
    Serving,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Restarting => "restarting",
            Self::Building => "building",
            Self::Serving => "serving",
        };
        f.write_str(name)
    }
}

/// Outcome of looking at one change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Run the rebuild sequence.
    Rebuild,
    /// Nothing to do.
    Ignore,
}

/// Drives a [`BuildStep`] and a [`ServeStep`] from a [`WatchSource`].
pub struct Orchestrator<W, B, R> {
    watcher: W,
    builder: B,
    runner: R,
    restart_process: bool,
    serve_on_build_failure: bool,
    debounce: Option<Duration>,
    phase: Phase,
}

impl<W, B, R> Orchestrator<W, B, R>
where
    W: WatchSource,
    B: BuildStep,
    R: ServeStep,
{
    /// Assemble an orchestrator from its parts.
    pub fn new(config: &Config, watcher: W, builder: B, runner: R) -> Self {
        Self {
            watcher,
            builder,
            runner,
            restart_process: config.restart_process,
            serve_on_build_failure: config.serve_on_build_failure,
            debounce: config.debounce(),
            phase: Phase::Idle,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The serve step.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Run the initial build and start the server.
    ///
    /// # Errors
    ///
    /// Returns the first failure; at startup both steps are fatal.
    pub async fn start(&mut self) -> Result<()> {
        self.enter(Phase::Building);
        let built = self.builder.build().await;
        if built.is_err() {
            self.enter(Phase::Idle);
            return built;
        }

        self.enter(Phase::Serving);
        let served = self.runner.serve().await;
        self.enter(Phase::Idle);
        served
    }

    /// Process events until the watch source closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch source closes.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Process events until `shutdown` resolves, then stop the server.
    ///
    /// An in-flight build or restart is finished before shutdown is noticed.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch source closes or the final stop fails.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let message = tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                message = self.watcher.next() => message,
            };

            let Some(message) = message else {
                tracing::error!("Watch source closed");
                if let Err(e) = self.runner.stop().await {
                    tracing::warn!(error = %e, "Failed to stop server");
                }
                return Err(Error::internal("watch source closed"));
            };

            self.dispatch(message).await;
        }

        self.runner.stop().await
    }

    /// Handle one message from the watcher.
    pub async fn dispatch(&mut self, message: WatchMessage) {
        match message {
            WatchMessage::Event(event) => {
                if self.classify(&event) == Trigger::Rebuild {
                    self.coalesce().await;
                    self.rebuild().await;
                }
            }
            WatchMessage::Error(e) => report_watch_error(&e),
        }
    }

    /// Decide what a change event asks for.
    ///
    /// A removed path is re-subscribed first; it only counts as a write if
    /// the new subscription succeeds.
    pub fn classify(&mut self, event: &ChangeEvent) -> Trigger {
        match event.op {
            ChangeOp::Write => {
                tracing::info!(path = %event.path.display(), "File modified");
                Trigger::Rebuild
            }
            ChangeOp::Remove => {
                tracing::info!(path = %event.path.display(), "File removed");
                match self.watcher.resubscribe(&event.path) {
                    Ok(()) => Trigger::Rebuild,
                    Err(e) => {
                        tracing::warn!(error = %e, "Re-subscribe failed, skipping rebuild");
                        Trigger::Ignore
                    }
                }
            }
            ChangeOp::Create | ChangeOp::Rename | ChangeOp::Other => {
                tracing::info!(path = %event.path.display(), op = %event.op, "Unhandled event");
                Trigger::Ignore
            }
        }
    }

    /// The shared write sequence: optional stop, build, then serve.
    ///
    /// Failures are reported and never end the loop. By default the server
    /// is started even after a failed build.
    pub async fn rebuild(&mut self) {
        if self.restart_process {
            self.enter(Phase::Restarting);
            if let Err(e) = self.runner.stop().await {
                tracing::warn!(error = %e, "Failed to stop server");
            }
        }

        self.enter(Phase::Building);
        let built = match self.builder.build().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Build failed");
                false
            }
        };

        if built || self.serve_on_build_failure {
            self.enter(Phase::Serving);
            if let Err(e) = self.runner.serve().await {
                tracing::error!(error = %e, "Failed to start server");
            }
        } else {
            tracing::warn!("Not starting server after failed build");
        }

        self.enter(Phase::Idle);
    }

    /// Absorb events arriving within the debounce window.
    async fn coalesce(&mut self) {
        let Some(window) = self.debounce else {
            return;
        };
        let deadline = Instant::now() + window;
        let mut absorbed = 0_usize;

        while let Ok(Some(message)) =
            tokio::time::timeout_at(deadline, self.watcher.next()).await
        {
            match message {
                WatchMessage::Event(event) => {
                    self.classify(&event);
                    absorbed += 1;
                }
                WatchMessage::Error(e) => report_watch_error(&e),
            }
        }

        if absorbed > 0 {
            tracing::debug!(absorbed, "Coalesced events into one rebuild");
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::debug!(from = %self.phase, to = %phase, "Phase change");
            self.phase = phase;
        }
    }
}

fn report_watch_error(error: &crate::error::WatcherError) {
    tracing::error!(error = %error, "Watch error");
}
