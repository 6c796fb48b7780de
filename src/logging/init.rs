use std::{path::Path, sync::Mutex};

use anyhow::{Context, Result};

// Global guard to keep the file appender alive
static FILE_APPENDER_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> =
    Mutex::new(None);

const LOG_FILE_PREFIX: &str = "pidguard.log";

/// Flush and close the log file appender.
/// This should be called before `std::process::exit`, which skips destructors.
pub fn flush_logs() {
    // Taking the guard will drop it, which flushes pending logs
    if let Ok(mut guard_holder) = FILE_APPENDER_GUARD.lock()
        && let Some(guard) = guard_holder.take()
    {
        drop(guard);
    }
}

fn base_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize tracing on stderr. RUST_LOG (if set) takes precedence.
/// Otherwise, -v/-vv map to "debug"/"trace".
pub fn init_tracing(verbosity: u8) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| base_filter(verbosity).to_string());

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_new(filter).context("invalid RUST_LOG / filter")?;

    // Allow re-init to be a no-op in tests
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init();

    Ok(())
}

/// Initialize tracing on stderr plus a daily rolling file in `log_dir`.
/// RUST_LOG (if set) takes precedence.
pub fn init_tracing_with_file(log_dir: &Path, verbosity: u8) -> Result<()> {
    use tracing_appender::rolling;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| base_filter(verbosity).to_string());
    let filter_layer = EnvFilter::try_new(filter).context("invalid RUST_LOG / filter")?;

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;
    let file_appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Store the guard globally to keep it alive for the program duration
    if let Ok(mut guard_holder) = FILE_APPENDER_GUARD.lock() {
        *guard_holder = Some(guard);
    }

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(non_blocking);
    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    Ok(())
}
