//! Entrypoint for the `eda` command.
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and command line.
//! 2. Initializing logging.
//! 3. Spawning the session controller over the HTTP backend.
//! 4. Submitting the selected file and printing the session as it streams in.

use anyhow::{Context, bail};
use clap::Parser;
use eda_client::{
    Submission,
    backend::HttpBackend,
    config::Config,
    controller::SessionController,
    render::TerminalPrinter,
};
use eda_core::SelectedFile;
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "eda",
    version,
    about = "Upload a data file and follow the automated analysis as it streams in"
)]
struct Cli {
    /// The data file to analyze (csv, xlsx or xls by default).
    file: Option<PathBuf>,

    /// Base address of the analysis backend. Overrides EDA_SERVER_URL.
    #[arg(long)]
    server: Option<String>,
}

/// Listens for the `Ctrl+C` signal. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received interrupt. Closing the session...");
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(server) = &cli.server {
        config = config
            .with_server_url(server)
            .context("Invalid --server address")?;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!(server = %config.server_url, "Configuration loaded");

    let file = cli
        .file
        .as_ref()
        .map(|path| {
            SelectedFile::from_path(path)
                .with_context(|| format!("Cannot read {}", path.display()))
        })
        .transpose()?;

    // --- 3. Start the Session Controller ---
    let backend = Arc::new(HttpBackend::from_config(&config));
    let (handle, controller_task) = SessionController::spawn(backend, config.upload_policy());

    let mut printer = TerminalPrinter::new(std::io::stdout());
    match handle.submit(file).await? {
        Submission::Started(session_id) => info!(%session_id, "Session started"),
        Submission::Rejected(_) => {
            printer.render(&handle.current_state())?;
            return Ok(ExitCode::from(2));
        }
    }

    // --- 4. Follow the Session ---
    let mut state_rx = handle.subscribe();
    let interrupted = shutdown_signal();
    tokio::pin!(interrupted);
    let final_state = loop {
        let snapshot = state_rx.borrow_and_update().clone();
        printer.render(&snapshot)?;
        if snapshot.is_settled() {
            break snapshot;
        }
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    bail!("Session controller stopped unexpectedly");
                }
            }
            _ = &mut interrupted => {
                handle.shutdown().await?;
                controller_task.await?;
                printer.render(&handle.current_state())?;
                return Ok(ExitCode::from(130));
            }
        }
    };

    handle.shutdown().await?;
    controller_task.await?;

    if final_state.error.is_some() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
