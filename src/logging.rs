//! Tracing setup for the server process.
//!
//! Console output goes to stderr so piped stdout stays clean for tooling. A
//! second layer writes daily-rotated files through a non-blocking appender;
//! `SUPPORT_KB_LOG_FILE` overrides the default `logs/support-kb.log` target.

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Dropping the guard flushes and stops the appender thread, so it has to
// outlive every log call in the process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// `RUST_LOG` controls filtering and defaults to `info`. The file layer is
/// best-effort: when the log directory cannot be created the server keeps
/// running with console output only.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    match file_writer() {
        Some(writer) => {
            let file = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .compact();
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
        }
    }
}

fn file_writer() -> Option<NonBlocking> {
    let target = std::env::var("SUPPORT_KB_LOG_FILE")
        .unwrap_or_else(|_| "logs/support-kb.log".to_string());
    let path = Path::new(&target);
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let filename = path.file_name()?;

    if let Err(error) = std::fs::create_dir_all(directory) {
        eprintln!("Cannot create log directory {}: {error}", directory.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(directory, filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Some(writer)
}
