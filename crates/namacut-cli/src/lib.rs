//! Headless export runner.
//!
//! This crate provides:
//! - Environment-driven output settings and picture transform
//! - One-shot export execution with progress logging and Ctrl-C abort

pub mod config;
pub mod error;
pub mod runner;

pub use config::CliConfig;
pub use error::{CliError, CliResult};
pub use runner::{build_transform, run_export, ExportArgs, USAGE};
