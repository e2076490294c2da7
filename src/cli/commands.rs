//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rolesync - Cache-backed synchronization of provisioning roles.
#[derive(Parser, Debug)]
#[command(name = "rolesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "ROLESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter configuration file.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the role configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show the actions the next sync would apply.
    Plan,

    /// Synchronize the roles directory with the configuration.
    Sync,

    /// Remove every role directory and the role cache.
    Clean {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Inspect the role cache.
    Cache {
        /// Cache subcommand.
        #[command(subcommand)]
        command: CacheCommands,
    },
}

/// Role cache subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show the cached roles.
    Show,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable log lines.
    #[default]
    Text,
    /// One JSON object per log line.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_with_globals() {
        let cli = Cli::try_parse_from([
            "rolesync",
            "sync",
            "--output",
            "json",
            "--config",
            "/etc/rolesync.yaml",
        ])
        .expect("arguments should parse");

        assert!(matches!(cli.command, Commands::Sync));
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/rolesync.yaml")));
    }

    #[test]
    fn test_parse_cache_show() {
        let cli = Cli::try_parse_from(["rolesync", "cache", "show"]).expect("arguments should parse");
        assert!(matches!(
            cli.command,
            Commands::Cache {
                command: CacheCommands::Show
            }
        ));
    }
}
