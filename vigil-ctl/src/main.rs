//! Administrative binary for the Vigil failover controller.
//!
//! Exit codes: 0 on success, 1 when the requested command is not valid in
//! the current state, 2 when an external dependency is unreachable.

mod commands;
mod settings;

use clap::{Parser, Subcommand};
use settings::ControllerSettings;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vigil-ctl", version, about = "Failover controller administration")]
struct Cli {
    /// Path to the JSON settings file.
    #[arg(short, long, env = "VIGIL_SETTINGS", default_value = "vigil.json")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the health monitors and the controller loop.
    Run,
    /// Print the reconstructed state and current lease holder.
    Status,
    /// Force a failover evaluation now, bypassing hysteresis.
    Trigger,
    /// Release the current lease and abort the attempt in flight.
    Abort,
    /// Replay the audit log and continue from the last incomplete step.
    Resume,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let settings = match ControllerSettings::load(&cli.settings) {
        Ok(settings) => settings,
        Err(e) => {
            error!("failed to load settings: {:#}", e);
            return ExitCode::from(commands::EXIT_UNREACHABLE);
        }
    };

    let result = match cli.command {
        Command::Run => commands::run(settings).await,
        Command::Status => commands::status(settings).await,
        Command::Trigger => commands::trigger(settings).await,
        Command::Abort => commands::abort(settings).await,
        Command::Resume => commands::resume(settings).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(commands::EXIT_UNREACHABLE)
        }
    }
}
