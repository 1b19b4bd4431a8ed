//! Build and serve subprocesses.
//!
//! This module provides:
//! - Command string tokenization with env and backtick substitution
//! - The blocking build step
//! - Supervision of the single serve process

mod builder;
mod command;
mod runner;

pub use builder::Builder;
pub use command::CommandTokenizer;
pub use runner::{ProcessHandle, Runner};

use crate::Result;

/// Something that can run a build to completion.
#[allow(async_fn_in_trait)]
pub trait BuildStep {
    /// Run the build, returning once it has exited.
    ///
    /// # Errors
    ///
    /// Returns an error if the build fails.
    async fn build(&mut self) -> Result<()>;
}

/// Something that owns the serve process.
#[allow(async_fn_in_trait)]
pub trait ServeStep {
    /// Start the server if it is not already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be started.
    async fn serve(&mut self) -> Result<()>;

    /// Stop the server if it is running, waiting for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not stop cleanly.
    async fn stop(&mut self) -> Result<()>;
}
