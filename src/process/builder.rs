//! Runs the build command to completion.

use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;

use super::command::CommandTokenizer;
use super::BuildStep;
use crate::config::Config;
use crate::error::BuildError;
use crate::Result;

/// Executes the configured build command.
#[derive(Debug, Clone)]
pub struct Builder {
    command: String,
    tokenizer: CommandTokenizer,
}

impl Builder {
    /// Create a builder for `config.build_command`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command string is malformed.
    pub fn new(config: &Config) -> Result<Self> {
        let tokenizer = CommandTokenizer::from_config(&config.tokenizer);
        tokenizer.validate(&config.build_command)?;

        Ok(Self {
            command: config.build_command.clone(),
            tokenizer,
        })
    }

    /// The command string this builder runs.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run the build and wait for it to exit.
    ///
    /// An empty command succeeds without running anything.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Failed`] if the command cannot be tokenized or
    /// started, or exits nonzero. The error carries stdout and stderr.
    pub async fn build(&self) -> Result<()> {
        let argv = self
            .tokenizer
            .tokenize(&self.command)
            .await
            .map_err(|e| BuildError::failed(None, e.to_string()))?;

        let Some((program, args)) = argv.split_first() else {
            tracing::debug!("No build command configured, skipping build");
            return Ok(());
        };

        tracing::info!(command = %self.command, "Building");
        let start = Instant::now();

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| BuildError::failed(None, format!("failed to start '{program}': {e}")))?;

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            tracing::info!(elapsed_ms, "Build succeeded");
            if !captured.trim().is_empty() {
                tracing::debug!(output = %captured.trim_end(), "Build output");
            }
            Ok(())
        } else {
            Err(BuildError::failed(output.status.code(), captured.trim_end()).into())
        }
    }
}

impl BuildStep for Builder {
    async fn build(&mut self) -> Result<()> {
        Self::build(self).await
    }
}
