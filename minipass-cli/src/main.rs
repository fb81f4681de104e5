use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use url::Url;

mod cli;
mod commands;
mod error;

use cli::{CliArgs, Commands};
use error::AppError;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("minipass.log")?;

    let multi_writer = MakeWriterExt::and(std::io::stdout, log_file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!("Minipass admin client toolkit");
    info!("=============================");

    let server = Url::parse(&args.server)
        .map_err(|e| AppError::InvalidInput(format!("Invalid server URL '{}': {e}", args.server)))?;

    match args.command {
        Commands::Listen {
            max_visible,
            dismiss_after,
            max_reconnects,
        } => commands::listen(server, max_visible, dismiss_after, max_reconnects).await,
        Commands::Push { command } => commands::push(server, command).await,
        Commands::Cache { command } => commands::cache(server, command).await,
    }
}
