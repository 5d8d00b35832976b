//! Log output for revtree.
//!
//! The terminal belongs to the TUI, so logs go to a file next to the review
//! database (`.revtree/revtree.log` by default) through a non-blocking
//! `tracing-appender` writer. The filter comes from `REVTREE_LOG` when set,
//! otherwise from the config's `log_level`.
//!
//! A log directory that cannot be written (a read-only checkout) disables
//! logging; it never stops the program.

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable that overrides the configured log filter.
pub const LOG_ENV: &str = "REVTREE_LOG";

const LOG_FILE: &str = "revtree.log";

/// Installs the global subscriber writing to `dir/revtree.log`.
///
/// Returns `None`, after reporting the reason on stderr, when the log file
/// cannot be opened; no subscriber is installed then. Otherwise the returned
/// guard flushes buffered lines when dropped; keep it alive until the
/// process exits.
pub fn init_logging(dir: &Path, level: &str) -> Option<WorkerGuard> {
    let (writer, guard) = match file_writer(dir) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("revtree: logging disabled, cannot write to {}: {}", dir.display(), e);
            return None;
        }
    };

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
        .init();
    Some(guard)
}

/// Opens `dir/revtree.log` for appending behind a non-blocking writer.
///
/// # Errors
///
/// Returns `Err` if `dir` cannot be created or the file cannot be opened.
fn file_writer(dir: &Path) -> io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(dir)
        .map_err(io::Error::other)?;
    Ok(tracing_appender::non_blocking(appender))
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_directory_is_created_on_demand() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("state").join("logs");

        let writer = file_writer(&dir);

        assert!(writer.is_ok());
        assert!(dir.is_dir());
    }

    #[test]
    fn unwritable_log_directory_disables_logging() {
        // A regular file where the directory should be: fails even as root.
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let dir = blocker.path().join("logs");

        assert!(file_writer(&dir).is_err());
        assert!(init_logging(&dir, "debug").is_none());
    }
}
