//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::track::SessionId;

/// Track command arguments.
#[derive(Debug, Args)]
pub struct TrackCommand {
    /// JSON-lines file to read fixes from ('-' for standard input)
    #[arg(short, long, value_name = "FILE")]
    pub source: Option<PathBuf>,

    /// Delay between replayed fixes in milliseconds
    #[arg(short = 'i', long, value_name = "MS")]
    pub replay_interval: Option<u64>,

    /// Output format for the finished session
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Sessions command arguments.
#[derive(Debug, Args)]
pub struct SessionsCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Session to show
    pub id: SessionId,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Session to delete
    pub id: SessionId,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
