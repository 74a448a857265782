//! `georun` - CLI for recording GPS tracks
//!
//! This binary records location fixes into sessions and manages the
//! recorded sessions.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use georun::cli::{
    output, Cli, Command, ConfigCommand, DeleteCommand, OutputFormat, ShowCommand, TrackCommand,
};
use georun::{init_logging, Config, Error, JsonLinesSource, LocationSource, Storage, Tracker};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(cli.config, config_cmd);
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Track(track_cmd) => run_tracking(&config, &track_cmd, !cli.quiet),
        Command::Sessions(sessions_cmd) => handle_sessions(&config, sessions_cmd.format),
        Command::Show(show_cmd) => handle_show(&config, &show_cmd),
        Command::Delete(delete_cmd) => handle_delete(&config, &delete_cmd),
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Config(_) => Ok(()),
    }
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

fn run_tracking(config: &Config, cmd: &TrackCommand, show_updates: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let result = runtime.block_on(track(config, cmd, show_updates));

    // A blocking stdin read may never return; don't wait for it.
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}

async fn track(config: &Config, cmd: &TrackCommand, show_updates: bool) -> Result<()> {
    let storage = open_storage(config)?;

    let source_path = cmd
        .source
        .clone()
        .unwrap_or_else(|| config.location.source.clone());
    let interval = match cmd.replay_interval {
        Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
        None => config.replay_interval(),
    };
    let source = JsonLinesSource::new(source_path).with_replay_interval(interval);

    let mut tracker = Tracker::new(Arc::new(Mutex::new(storage)), Box::new(source))
        .with_channel_capacity(config.location.channel_capacity);

    let session_id = tracker.start().await?;
    eprintln!("Tracking session {session_id}. Press Ctrl-C to stop.");

    let mut updates = tracker.subscribe_location();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Interrupted, stopping session {}", session_id);
                break;
            }
            () = tracker.wait_for_source_end() => {
                info!("Location source finished");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = *updates.borrow_and_update();
                if let (true, Some(fix)) = (show_updates, latest) {
                    eprintln!("{fix}");
                }
            }
        }
    }

    let session = tracker
        .stop()
        .await?
        .context("tracking ended without an open session")?;
    let coordinates = tracker.coordinates(session.id)?;

    println!(
        "{}",
        output::render_session(
            &session,
            &coordinates,
            cmd.format,
            &config.display.time_format
        )?
    );
    Ok(())
}

fn handle_sessions(config: &Config, format: OutputFormat) -> Result<()> {
    let storage = open_storage(config)?;
    let sessions = storage.list_sessions()?;
    println!(
        "{}",
        output::render_sessions(&sessions, format, &config.display.time_format)?
    );
    Ok(())
}

fn handle_show(config: &Config, cmd: &ShowCommand) -> Result<()> {
    let storage = open_storage(config)?;
    let session = storage
        .get_session(cmd.id)?
        .ok_or(Error::SessionNotFound(cmd.id))?;
    let coordinates = storage.coordinates(cmd.id)?;

    println!(
        "{}",
        output::render_session(
            &session,
            &coordinates,
            cmd.format,
            &config.display.time_format
        )?
    );
    Ok(())
}

fn handle_delete(config: &Config, cmd: &DeleteCommand) -> Result<()> {
    let storage = open_storage(config)?;
    let session = storage
        .get_session(cmd.id)?
        .ok_or(Error::SessionNotFound(cmd.id))?;

    if !cmd.yes {
        let points = storage.coordinate_count(cmd.id)?;
        println!(
            "This will delete session {} started {} and its {} points.",
            session.id,
            output::format_time(session.start_time, &config.display.time_format),
            points
        );
        println!("Use --yes to confirm.");
        return Ok(());
    }

    if session.is_open() {
        warn!("Session {} has no end time; deleting it anyway", session.id);
    }
    if !storage.delete_session(cmd.id)? {
        return Err(Error::SessionNotFound(cmd.id).into());
    }
    println!("Deleted session {}.", cmd.id);
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;
    let open = storage.open_sessions()?;
    let source = JsonLinesSource::new(config.location.source.clone());
    let permission = source.permission();

    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "stats": stats,
            "open_session_ids": open.iter().map(|s| s.id).collect::<Vec<_>>(),
            "location_source": config.location.source,
            "location_permission": permission.granted,
            "location_permission_detail": permission.description,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("georun status");
        println!("-------------");
        println!("Database:      {}", storage.path().display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Sessions:      {}", stats.total_sessions);
        println!("Open sessions: {}", stats.open_sessions);
        for session in &open {
            println!(
                "  #{} started {}",
                session.id,
                output::format_time(session.start_time, &config.display.time_format)
            );
        }
        println!("Points:        {}", stats.total_coordinates);
        println!("Distance:      {}", stats.total_distance);
        println!("Source:        {}", config.location.source.display());
        println!("Permission:    {}", permission.description);
    }
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path).context("failed to load configuration")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Location]");
                println!("  Source:             {}", config.location.source.display());
                println!(
                    "  Replay interval:    {} ms",
                    config.location.replay_interval_ms
                );
                println!("  Channel capacity:   {}", config.location.channel_capacity);
                println!();
                println!("[Display]");
                println!("  Time format:        {}", config.display.time_format);
            }
        }
        ConfigCommand::Path => {
            println!(
                "{}",
                config_path
                    .unwrap_or_else(Config::default_config_path)
                    .display()
            );
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
