//! CLI module for rolesync.
//!
//! This module provides the command-line interface for planning and
//! applying role synchronization.

mod commands;
mod output;

pub use commands::{CacheCommands, Cli, Commands, LogFormat, OutputFormat};
pub use output::OutputFormatter;
