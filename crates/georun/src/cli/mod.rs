//! Command-line interface for georun.
//!
//! This module provides the CLI structure and output rendering for the
//! `georun` binary.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DeleteCommand, OutputFormat, SessionsCommand, ShowCommand, StatusCommand,
    TrackCommand,
};

/// georun - Record GPS tracks
///
/// Records location fixes into sessions stored in a local SQLite database,
/// and lists, shows and deletes recorded sessions.
#[derive(Debug, Parser)]
#[command(name = "georun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a new session until Ctrl-C or the end of the source
    Track(TrackCommand),

    /// List recorded sessions
    Sessions(SessionsCommand),

    /// Show one session and its track
    Show(ShowCommand),

    /// Delete a session and its track
    Delete(DeleteCommand),

    /// Show database status
    Status(StatusCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::SessionId;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "georun");
    }

    #[test]
    fn test_verbosity_levels() {
        use crate::logging::Verbosity;

        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_track_defaults() {
        let cli = Cli::try_parse_from(["georun", "track"]).unwrap();
        let Command::Track(cmd) = cli.command else {
            panic!("expected track command");
        };
        assert!(cmd.source.is_none());
        assert!(cmd.replay_interval.is_none());
        assert_eq!(cmd.format, OutputFormat::Plain);
    }

    #[test]
    fn test_parse_track_with_source() {
        let cli = Cli::try_parse_from([
            "georun",
            "track",
            "--source",
            "/tmp/ride.jsonl",
            "--replay-interval",
            "250",
        ])
        .unwrap();
        let Command::Track(cmd) = cli.command else {
            panic!("expected track command");
        };
        assert_eq!(cmd.source, Some(PathBuf::from("/tmp/ride.jsonl")));
        assert_eq!(cmd.replay_interval, Some(250));
    }

    #[test]
    fn test_parse_sessions_format() {
        let cli = Cli::try_parse_from(["georun", "sessions", "-f", "json"]).unwrap();
        let Command::Sessions(cmd) = cli.command else {
            panic!("expected sessions command");
        };
        assert_eq!(cmd.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_show() {
        let cli = Cli::try_parse_from(["georun", "show", "12"]).unwrap();
        let Command::Show(cmd) = cli.command else {
            panic!("expected show command");
        };
        assert_eq!(cmd.id, SessionId(12));
    }

    #[test]
    fn test_parse_show_rejects_non_numeric_id() {
        assert!(Cli::try_parse_from(["georun", "show", "latest"]).is_err());
    }

    #[test]
    fn test_parse_delete_with_yes() {
        let cli = Cli::try_parse_from(["georun", "delete", "4", "--yes"]).unwrap();
        let Command::Delete(cmd) = cli.command else {
            panic!("expected delete command");
        };
        assert_eq!(cmd.id, SessionId(4));
        assert!(cmd.yes);
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["georun", "config", "show", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Show { json: true })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = Cli::try_parse_from(["georun", "-c", "/custom/config.toml", "status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["georun", "status", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["georun", "sessions", "-q"]).unwrap();
        assert!(cli.quiet);
    }
}
