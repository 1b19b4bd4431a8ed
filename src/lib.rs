//! wbs: watch, build, serve.
//!
//! Watches a set of paths, runs a build command when files change, and
//! keeps a long-running server process restarted after each build.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod observability;
pub mod orchestrator;
pub mod process;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, Phase};
