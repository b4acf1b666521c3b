//! Logging initialisation for the bisque-devices CLI.
//!
//! When the `BISQUE_DEVICES_LOG` environment variable is set to `1`, logs are
//! also written to `bisque-devices.log` in the OS log directory. Otherwise only
//! stderr output (filtered by `RUST_LOG`, `warn` by default) is enabled.
//!
//! `-v` raises the default stderr level to `debug` so every decoded and
//! encoded device is traced.

use std::path::PathBuf;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialise the global tracing subscriber.
///
/// Keep the returned `LogGuard` alive until the process exits.
pub fn init(verbose: bool) -> LogGuard {
    let default = if verbose { "debug" } else { "warn" };

    let file_guard = if std::env::var("BISQUE_DEVICES_LOG").as_deref() == Ok("1") {
        let dir = log_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        let _ = std::fs::create_dir_all(&dir);
        let file_appender = tracing_appender::rolling::never(dir, "bisque-devices.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter(if verbose { "debug" } else { "info" }))
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter(default))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();

        None
    };

    LogGuard {
        _file_guard: file_guard,
    }
}

fn log_dir() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return Some(PathBuf::from(xdg).join("bisque-devices"));
    }
    let mut p = PathBuf::from(std::env::var("HOME").ok()?);
    #[cfg(target_os = "macos")]
    {
        p.push("Library");
        p.push("Logs");
    }
    #[cfg(not(target_os = "macos"))]
    {
        p.push(".local");
        p.push("share");
    }
    p.push("bisque-devices");
    Some(p)
}
