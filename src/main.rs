mod api;
mod app;
mod config;
mod error;
mod input;
mod models;
mod status;
mod storage;
mod workers;

#[cfg(test)]
mod test_utils;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

use crate::api::HttpLibrary;
use crate::config::{load_config, locate_config};
use crate::status::SharedState;
use crate::storage::Storage;

/// Appends to `log_file` from a background thread. Lines still queued are
/// flushed when the guard drops.
fn log_writer(log_file: &Path) -> Result<(NonBlocking, WorkerGuard), String> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| format!("failed to open log file {}: {e}", log_file.display()))?;
    Ok(tracing_appender::non_blocking(file))
}

/// Logs go to a file; the terminal belongs to the UI. The returned guard
/// must be held until exit.
fn init_logging(log_file: &Path) -> Result<WorkerGuard, String> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let (writer, guard) = log_writer(log_file)?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,romdeck=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true),
        )
        .try_init()
        .map_err(|e| format!("failed to install logger: {e}"))?;
    Ok(guard)
}

fn main() -> Result<(), String> {
    let explicit = std::env::args().nth(1);
    let config_path = locate_config(explicit.as_deref());
    let config = load_config(&config_path).map_err(|e| e.to_string())?;

    let log_guard = init_logging(&config.log_file)?;
    info!(config = %config_path.display(), version = env!("CARGO_PKG_VERSION"), "romdeck starting");

    let api = HttpLibrary::new(&config.server).map_err(|e| e.to_string())?;
    let storage = Storage::new(&config.storage).map_err(|e| e.to_string())?;
    let state = Arc::new(SharedState::new());

    let mut app = app::App::new(Arc::new(api), state, storage, &config.ui);
    if let Err(e) = app.run() {
        tracing::error!(error = %e, "terminal failure");
        drop(log_guard);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
