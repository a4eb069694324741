//! Logging initialization.
//!
//! With `logging.to_file` set, logs go to `<state>/logs/automl-wizard-{datetime}.log`;
//! otherwise to stderr, so command output on stdout stays clean.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Flushes buffered file logs when dropped; keep alive for the whole run
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file, when logging to a file
    pub log_file_path: Option<PathBuf>,
}

/// Level filter directive: `--debug` wins over the configured level
fn log_level(config: &Config, debug_override: bool) -> String {
    if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    }
}

fn log_file_name(timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    format!("automl-wizard-{}.log", timestamp.format("%Y%m%dT%H%M%SZ"))
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| log_level(config, debug_override)),
    );

    if config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)?;

        let log_filename = log_file_name(&chrono::Utc::now());
        let log_file_path = logs_dir.join(&log_filename);

        let (non_blocking, guard) = file_writer(&logs_dir, &log_filename);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}

fn file_writer(
    logs_dir: &Path,
    file_name: &str,
) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    let file_appender = tracing_appender::rolling::never(logs_dir, file_name);
    tracing_appender::non_blocking(file_appender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_logs_path_under_state_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let logs_dir = config.logs_path();
        assert!(logs_dir.ends_with("logs"));
        assert!(logs_dir.starts_with(temp_dir.path()));
    }

    #[test]
    fn test_log_file_name_format() {
        let timestamp = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 5).unwrap();
        assert_eq!(
            log_file_name(&timestamp),
            "automl-wizard-20240601T123005Z.log"
        );
    }

    #[test]
    fn test_debug_flag_overrides_level() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.logging.level = "warn".to_string();

        assert_eq!(log_level(&config, false), "warn");
        assert_eq!(log_level(&config, true), "debug");
    }

    #[test]
    fn test_file_writer_creates_log_file() {
        let temp_dir = TempDir::new().unwrap();
        let (mut writer, guard) = file_writer(temp_dir.path(), "test.log");
        std::io::Write::write_all(&mut writer, b"hello\n").unwrap();
        drop(writer);
        drop(guard);

        let contents = std::fs::read_to_string(temp_dir.path().join("test.log")).unwrap();
        assert_eq!(contents, "hello\n");
    }
}
