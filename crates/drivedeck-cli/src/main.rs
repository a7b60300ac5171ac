mod app;
mod cli;
mod format;
mod shell;

use std::io;

use anyhow::Result;
use clap::Parser;
use drivedeck_core::Config;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::app::{user_message, App};
use crate::cli::{Cli, Command};

const LOG_FILE_PREFIX: &str = "drivedeck.log";

fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // RUST_LOG controls the level (e.g., RUST_LOG=drivedeck_core=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // The file layer is optional; a missing cache dir only costs the log file
    let (file_layer, guard) = match config.log_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Could not read config, using defaults: {:#}", e);
        Config::default()
    });
    if let Some(storage) = cli.storage {
        config.storage = storage;
    }

    let log_guard = init_tracing(&config);
    info!(storage = ?config.storage, "drivedeck starting");

    let mut app = App::new(config)?;
    app.start();

    let result = match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => shell::run(&app).await,
        command => app.run(command).await,
    };

    app.shutdown();

    if let Err(e) = result {
        warn!(error = %e, "Command failed");
        eprintln!("{}", user_message(&e));
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}
