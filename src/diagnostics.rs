//! Data/log directories, log rotation and tracing setup.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;

const APP_DIR_NAME: &str = "storefront-invoice";
const LOG_FILE_PREFIX: &str = "facture";
const DEFAULT_FILTER: &str = "info,storefront_invoice_lib=debug";

// ---------------------------------------------------------------------------
// Directories
// ---------------------------------------------------------------------------

/// Per-user application data directory.
pub fn default_data_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join(APP_DIR_NAME)
}

pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

// ---------------------------------------------------------------------------
// Log rotation
// ---------------------------------------------------------------------------

/// Prune old log files, keeping only the most recent `MAX_LOG_FILES`.
/// Returns how many files were removed.
pub fn prune_old_logs(log_dir: &Path) -> usize {
    if !log_dir.exists() {
        return 0;
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with(&format!("{LOG_FILE_PREFIX}.")) {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(std::time::UNIX_EPOCH);
                log_files.push((path, modified));
            }
        }
    }

    // Newest first; ties broken by name so dated files sort predictably.
    log_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to prune log file {}: {e}", path.display()),
        }
    }
    removed
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Console (stderr) plus daily rolling file logging. Keep the returned guard
/// alive for the life of the process so buffered lines are flushed.
pub fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = fs::create_dir_all(log_dir);
    let pruned = prune_old_logs(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if pruned > 0 {
        tracing::debug!(pruned, "Old log files removed");
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_keeps_newest_log_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        for day in 1..=(MAX_LOG_FILES + 3) {
            let name = format!("{LOG_FILE_PREFIX}.2026-10-{day:02}");
            fs::write(dir.path().join(name), b"log").expect("write log");
        }
        fs::write(dir.path().join("unrelated.txt"), b"keep").expect("write other");

        let removed = prune_old_logs(dir.path());
        assert_eq!(removed, 3);

        let remaining: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(LOG_FILE_PREFIX)
            })
            .collect();
        assert_eq!(remaining.len(), MAX_LOG_FILES);
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn prune_ignores_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(prune_old_logs(&dir.path().join("absent")), 0);
    }

    #[test]
    fn log_dir_lives_under_data_dir() {
        let data = PathBuf::from("/tmp/invoice-data");
        assert_eq!(log_dir(&data), data.join("logs"));
        assert!(default_data_dir().ends_with(APP_DIR_NAME));
    }
}
