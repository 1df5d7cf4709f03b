pub mod models;
pub mod services;
pub mod cli;
pub mod gui;

use services::security::SECURITY_TARGET;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};
use tracing::info;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{
    filter::Targets,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

static LOG_GUARDS: OnceLock<Vec<WorkerGuard>> = OnceLock::new();
static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

const LOG_PREFIX: &str = "ai-detector_";
const SECURITY_LOG: &str = "security.log";

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Default to `debug` instead of `info` when `RUST_LOG` is unset
    pub verbose: bool,
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

/// Initialize logging: console on stderr, a per-session log file and a
/// daily-rotating security log that only receives `security` events
pub fn init_logging(options: &LoggingOptions) {
    let default_level = if options.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries results; diagnostics go to stderr
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(options.verbose);

    let logs_dir = if env_flag("AI_DETECTOR_DISABLE_FILE_LOG") {
        None
    } else {
        let dir = match std::env::var("AI_DETECTOR_LOG_DIR") {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => get_logs_dir(),
        };
        match fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(e) => {
                eprintln!("Failed to create logs directory: {}", e);
                None
            }
        }
    };

    let Some(logs_dir) = logs_dir else {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init();
        info!("File logging disabled; console only");
        return;
    };

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_filename = format!("{}{}.log", LOG_PREFIX, timestamp);

    let (file_writer, file_guard) = tracing_appender::non_blocking(rolling::never(&logs_dir, &log_filename));
    let (security_writer, security_guard) = tracing_appender::non_blocking(rolling::daily(&logs_dir, SECURITY_LOG));
    let _ = LOG_GUARDS.set(vec![file_guard, security_guard]);
    let _ = LOG_DIR.set(logs_dir.clone());

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let security_layer = fmt::layer()
        .with_writer(security_writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(Targets::new().with_target(SECURITY_TARGET, Level::INFO));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .with(security_layer)
        .try_init();

    info!(log_file = %logs_dir.join(&log_filename).display(), version = env!("CARGO_PKG_VERSION"), "logging.initialized");
}

/// Remove log files older than `retention_days` on a background thread.
/// No-op when file logging is off.
pub fn schedule_log_cleanup(retention_days: u32) {
    if env_flag("AI_DETECTOR_DISABLE_LOG_CLEANUP") {
        return;
    }
    let Some(logs_dir) = LOG_DIR.get().cloned() else {
        return;
    };
    let retention = Duration::from_secs(u64::from(retention_days.max(1)) * 24 * 60 * 60);
    std::thread::spawn(move || {
        let removed = cleanup_old_logs(&logs_dir, retention, SystemTime::now());
        if removed > 0 {
            info!(removed, retention_days, "logging.cleanup");
        }
    });
}

/// Get the logs directory path
fn get_logs_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("ai-detector").join("logs");
    }
    PathBuf::from("logs")
}

/// Remove session and security logs last modified before `now - retention`
fn cleanup_old_logs(logs_dir: &Path, retention: Duration, now: SystemTime) -> usize {
    let entries: Vec<_> = match fs::read_dir(logs_dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(_) => return 0,
    };

    let cutoff = now.checked_sub(retention).unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;
    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        let ours = (name.starts_with(LOG_PREFIX) && name.ends_with(".log")) || name.starts_with(SECURITY_LOG);
        if !ours {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if modified < cutoff && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_only_touches_expired_log_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ai-detector_20240101_000000.log", "security.log.2024-01-01", "notes.txt"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let day = Duration::from_secs(24 * 60 * 60);
        // Nothing is older than 30 days yet
        assert_eq!(cleanup_old_logs(dir.path(), 30 * day, SystemTime::now()), 0);

        // Evaluated 31 days in the future every log file has expired
        let later = SystemTime::now() + 31 * day;
        assert_eq!(cleanup_old_logs(dir.path(), 30 * day, later), 2);
        assert!(dir.path().join("notes.txt").exists());
    }
}
