//! Logging setup.

use anyhow::{anyhow, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Build the log filter: `RUST_LOG` when set, otherwise `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global `tracing` subscriber.
///
/// Logs go to stdout, or to `log_file` through a non-blocking writer when one
/// is given. The returned guard flushes the file writer on drop and must be
/// held for the lifetime of the process.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let builder = tracing_subscriber::fmt();

    let Some(log_file) = log_file else {
        builder
            .with_env_filter(env_filter(level))
            .try_init()
            .map_err(|e| anyhow!("Failed to install log subscriber: {e}"))?;
        return Ok(None);
    };

    let directory = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(directory)?;
    let file_name = log_file
        .file_name()
        .ok_or_else(|| anyhow!("Invalid log file name: {}", log_file.display()))?;

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    builder
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_env_filter(env_filter(level))
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {e}"))?;
    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_log_file_name() {
        let err = init_logging("info", Some(Path::new("/"))).unwrap_err();
        assert!(err.to_string().contains("Invalid log file name"));
    }
}
