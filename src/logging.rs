//! Tracing configuration and log routing.
//!
//! The server logs to stdout with a compact formatter filtered by `RUST_LOG`. Next to it runs a
//! job trail: a file layer that keeps every `pdfocr` event down to `debug` whatever `RUST_LOG`
//! says, so the stage skips, subprocess invocations, and page failures behind a failed Job can be
//! read back after the fact. The trail goes to `PDFOCR_LOG_FILE` when set and otherwise rotates
//! daily under `logs/`.
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, filter::Targets, fmt, prelude::*};

/// Directory holding the rotated job trail when `PDFOCR_LOG_FILE` is unset.
const TRAIL_DIR: &str = "logs";
/// File name prefix of the rotated job trail.
const TRAIL_PREFIX: &str = "pdfocr-jobs.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing for the server: stdout plus the job trail file.
pub fn init_tracing() {
    init_tracing_with(true);
}

/// Configure tracing with the job trail optionally disabled.
///
/// The CLI writes its result to stdout, so it logs to stderr only (default `warn`) and keeps no
/// trail.
pub fn init_tracing_with(job_trail: bool) {
    if !job_trail {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact()
                    .with_filter(env_filter),
            )
            .init();
        return;
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(env_filter);
    let trail_layer = configure_trail_writer().map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
            .with_filter(job_trail_filter())
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(trail_layer)
        .init();
}

/// Events kept in the job trail: the crate's own, down to `debug`, plus dependency warnings.
fn job_trail_filter() -> Targets {
    Targets::new()
        .with_default(Level::WARN)
        .with_target(env!("CARGO_CRATE_NAME"), Level::DEBUG)
}

/// Build a non-blocking writer for the job trail.
///
/// Returns `None` when the trail file or directory cannot be opened; the server keeps running
/// with stdout logging only.
fn configure_trail_writer() -> Option<NonBlocking> {
    if let Ok(path) = std::env::var("PDFOCR_LOG_FILE") {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                let _ = LOG_GUARD.set(guard);
                Some(non_blocking)
            }
            Err(err) => {
                eprintln!("Failed to open job trail {path}: {err}");
                None
            }
        }
    } else {
        if let Err(err) = std::fs::create_dir_all(TRAIL_DIR) {
            eprintln!("Failed to create {TRAIL_DIR} directory: {err}");
            return None;
        }
        let file_appender = tracing_appender::rolling::daily(TRAIL_DIR, TRAIL_PREFIX);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        Some(non_blocking)
    }
}
