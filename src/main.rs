//! scribeforge - resumable audio-to-document processing CLI.
//!
//! Parses the command, loads process configuration, and dispatches into the
//! job manager / pipeline driver / watcher, shutting down on SIGINT/SIGTERM.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scribeforge::cli::{build_context, run, Cli};
use scribeforge::config::ProcessConfig;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(|| std::path::PathBuf::from("./config.toml"));
    let config = match ProcessConfig::load(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error loading configuration: {e}");
            return std::process::ExitCode::from(2);
        }
    };

    let _logging_guard = match scribeforge::logging::init(&config.log_dir, &config.log_level) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            None
        }
    };

    info!(command = ?cli.command, "scribeforge starting");

    let app = match build_context(config).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: {e}");
            return std::process::ExitCode::from(e.exit_code() as u8);
        }
    };

    let cancel = CancellationToken::new();
    let watch_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, initiating shutdown");
            }
            _ = wait_for_sigterm() => {
                info!("received SIGTERM, initiating shutdown");
            }
        }
        watch_cancel.cancel();
    });

    let code = run(cli, app, cancel).await;
    if code != 0 {
        warn!(exit_code = code, "scribeforge exiting with non-zero status");
    }
    std::process::ExitCode::from(code as u8)
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
