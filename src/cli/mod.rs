//! CLI-specific functionality for the script host
//!
//! This module contains argument parsing, configuration discovery and the
//! report produced by the `check` command.

pub mod args;
pub mod config;
pub mod report;

pub use args::{Args, CheckConfig, Commands, ExecutionMode};
pub use config::ConfigDiscovery;
pub use report::CheckReport;
