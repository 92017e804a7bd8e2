//! `Seva`: weekly house cleaning assignments.
//!
//! Reads the shared assignment document from a `seva-store` server, prints
//! it, and (with an admin token) rotates or resets it. Configuration via
//! CLI flags, environment variables, or config file
//! (`~/.config/seva/config.toml`).
//!
//! ```bash
//! # Show this week's assignments
//! cargo run --bin seva -- --store-url ws://127.0.0.1:9100/ws show
//!
//! # Rotate (needs an admin token)
//! SEVA_STORE_URL=ws://127.0.0.1:9100/ws SEVA_TOKEN=s3cret cargo run --bin seva -- rotate
//!
//! # Preview next week offline, from the default assignment
//! cargo run --bin seva -- preview
//! ```

use std::io::Write as _;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use seva::auth::Access;
use seva::config::{CliArgs, ClientConfig, Command};
use seva::render;
use seva::roster::model::AssignmentModel;
use seva::roster::{ResetConfirmation, Roster, RosterError, Rotation, rotate};
use seva::store::remote::RemoteStore;
use seva::store::{DocumentStore, StoreError};

/// Errors reported to the user before exiting.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no store configured (use --store-url or SEVA_STORE_URL)")]
    NoStore,
    #[error("could not reach the store: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error("could not read confirmation: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file so command output stays clean.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let command = cli.command.unwrap_or(Command::Show);
    tracing::info!(?command, store_url = ?config.store_url, "seva starting");

    match run(command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("seva.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(command: Command, config: &ClientConfig) -> Result<(), CliError> {
    let Some(url) = config.store_url.as_deref() else {
        if command == Command::Preview {
            let model = AssignmentModel::new(config.schedule.clone());
            println!("No store configured, previewing from the default assignment.\n");
            print_preview(&model, &rotate(model.tasks(), model.current_state()));
            return Ok(());
        }
        return Err(CliError::NoStore);
    };

    let store = RemoteStore::connect(url, config.remote_options()).await?;
    let access = store.access();
    let mut roster = Roster::new(config.schedule.clone(), store, access);
    roster.sync().await?;

    match command {
        Command::Show => print_current(&roster, config),
        Command::Share => {
            let model = roster.model();
            println!(
                "{}",
                render::share_text(model.schedule(), model.current_state())
            );
        }
        Command::Preview => print_preview(roster.model(), &roster.preview_rotation()),
        Command::Rotate => {
            roster.rotate().await?;
            println!("Assignments rotated.\n");
            print_current(&roster, config);
        }
        Command::Reset { yes } => {
            if !yes && !confirm_reset().await? {
                println!("Reset cancelled.");
                return Ok(());
            }
            roster.reset(ResetConfirmation::confirmed()).await?;
            println!("Assignments reset to defaults.\n");
            print_current(&roster, config);
        }
        Command::Watch => {
            print_current(&roster, config);
            loop {
                roster.watch_next().await?;
                println!();
                print_current(&roster, config);
            }
        }
    }
    Ok(())
}

fn print_current<S: DocumentStore>(roster: &Roster<S, Access>, config: &ClientConfig) {
    let model = roster.model();
    print!("{}", render::table(model.schedule(), model.current_state()));
    match model.last_updated() {
        Some(ts) => println!(
            "\nLast updated: {}",
            render::last_updated(ts, &config.timestamp_format)
        ),
        None => println!("\nLast updated: never"),
    }
    if !roster.can_write() {
        println!("(read-only: set SEVA_TOKEN to rotate or reset)");
    }
}

fn print_preview(model: &AssignmentModel, rotation: &Rotation) {
    println!("Next week:\n");
    print!("{}", render::table(model.schedule(), &rotation.state));
    if !rotation.is_complete() {
        println!(
            "\nWarning: no slot for {}; rotate will refuse to store this.",
            rotation.unplaced.join(", ")
        );
    }
}

/// Asks on stdin before the current assignment is thrown away.
async fn confirm_reset() -> Result<bool, CliError> {
    print!("Reset all assignments to the defaults? [y/N] ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "YES"))
}
