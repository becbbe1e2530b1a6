//! Structured logging init (§1 expansion): an `EnvFilter` over the
//! configured level plus a daily-rotating file sink under `log_dir`,
//! simplified from the reference implementation's reloadable/broadcast
//! logging layer (no database-backed runtime filter changes here — jobs are
//! long but not interactively tunable mid-run).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Holds the file-appender worker guard; drop it only on process exit so
/// buffered log lines are flushed.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

pub fn init(log_dir: &std::path::Path, level: &str) -> std::io::Result<LoggingGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "scribeforge.log");
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    let file_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry().with(filter).with(stdout_layer).with(file_layer).init();

    Ok(LoggingGuard { _file_guard: file_guard })
}
