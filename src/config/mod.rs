//! Configuration management for wbs.
//!
//! Settings come from, in order of preference:
//! - The file named by `--config`
//! - `wbs.toml` in the working directory
//! - Built-in defaults

mod settings;

pub use settings::{Config, TokenizerConfig, DEFAULT_CONFIG_FILE};
