//! Configuration settings and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// File picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "wbs.toml";

/// Resolved settings for a watch/build/serve session.
///
/// Immutable once loaded; every component receives it at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Paths to subscribe to. Directories are watched recursively.
    pub watch_paths: Vec<PathBuf>,

    /// Gitignore-style patterns for paths whose changes are ignored.
    pub exclude: Vec<String>,

    /// File extensions (without the dot) that trigger a rebuild. Empty means all.
    pub extensions: Vec<String>,

    /// Build command; empty means the build step is a no-op.
    pub build_command: String,

    /// Serve command; empty means no server is managed.
    pub serve_command: String,

    /// Stop the running server before rebuilding on a write.
    pub restart_process: bool,

    /// Start the server even when the preceding build failed.
    pub serve_on_build_failure: bool,

    /// Coalesce events arriving within this window into one rebuild.
    pub debounce_ms: Option<u64>,

    /// How long to wait for the server to exit after it is signalled.
    pub stop_grace_ms: u64,

    /// Substitutions applied when splitting command strings.
    pub tokenizer: TokenizerConfig,
}

/// Command tokenizer switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenizerConfig {
    /// Expand `$NAME` and `${NAME}`.
    pub parse_env: bool,
    /// Replace `` `cmd` `` with the command's output.
    pub parse_backtick: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            parse_env: true,
            parse_backtick: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_paths: vec![PathBuf::from(".")],
            exclude: vec![".git".to_string(), "target".to_string()],
            extensions: Vec::new(),
            build_command: "cargo build".to_string(),
            serve_command: String::new(),
            restart_process: false,
            serve_on_build_failure: true,
            debounce_ms: None,
            stop_grace_ms: 5000,
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a TOML configuration file.
    ///
    /// Keys missing from the file keep their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is malformed or the settings are invalid.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for this run.
    ///
    /// An explicit path wins. Otherwise `wbs.toml` is used if it exists in
    /// the working directory, and built-in defaults if it does not. The
    /// returned path is the file that was loaded, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file fails to load.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = explicit.map(Path::to_path_buf).or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        });

        match path {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.watch_paths.is_empty() {
            return Err(Error::config("at least one watch path is required"));
        }

        if self.stop_grace_ms == 0 {
            return Err(Error::config("stop_grace_ms cannot be 0"));
        }

        if self.debounce_ms == Some(0) {
            return Err(Error::config("debounce_ms cannot be 0; omit it to disable"));
        }

        if let Some(ext) = self.extensions.iter().find(|e| e.starts_with('.')) {
            return Err(Error::config(format!(
                "extension '{ext}' must not start with a dot"
            )));
        }

        Ok(())
    }

    /// Grace period for stopping the server.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Debounce window, if coalescing is enabled.
    #[must_use]
    pub fn debounce(&self) -> Option<Duration> {
        self.debounce_ms.map(Duration::from_millis)
    }
}
