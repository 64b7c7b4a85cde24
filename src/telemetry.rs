//! Logging infrastructure
//!
//! Two sinks:
//! - Console logging (human-readable, only with `--verbose`)
//! - JSON file logging, rolled daily under the log directory
//!
//! `RUST_LOG` overrides the default filter in both modes.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "collab_agent.log";

/// Keeps the background log writer alive. Drop it last.
pub struct LogGuard {
    log_dir: PathBuf,
    _file_guard: WorkerGuard,
}

impl LogGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Filter used when `RUST_LOG` is not set
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug,hyper=info,reqwest=info,h2=info,rustls=info,handlebars=info"
    } else {
        "info,hyper=warn,reqwest=warn,h2=warn,rustls=warn,handlebars=warn"
    }
}

fn make_env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)))
}

/// Install the global subscriber.
///
/// Calling this twice is harmless: the second registration is ignored, but
/// a fresh file writer is still returned.
pub fn init(log_dir: &Path, verbose: bool) -> anyhow::Result<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    if verbose {
        // Console + file
        tracing_subscriber::registry()
            .with(make_env_filter(verbose))
            .with(fmt::layer().with_target(false).compact())
            .with(fmt::layer().json().with_writer(non_blocking))
            .try_init()
            .ok();
    } else {
        // File only, no console noise in the REPL
        tracing_subscriber::registry()
            .with(make_env_filter(verbose))
            .with(fmt::layer().json().with_writer(non_blocking))
            .try_init()
            .ok();
    }

    tracing::info!(
        log_dir = %log_dir.display(),
        verbose,
        "Logging initialized"
    );

    Ok(LogGuard {
        log_dir: log_dir.to_path_buf(),
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_parse() {
        for verbose in [true, false] {
            assert!(EnvFilter::try_new(default_filter(verbose)).is_ok());
        }
        assert!(default_filter(true).starts_with("debug"));
        assert!(default_filter(false).starts_with("info"));
    }

    #[test]
    fn test_init_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let guard = init(&log_dir, false).unwrap();
        assert!(log_dir.is_dir());
        assert_eq!(guard.log_dir(), log_dir.as_path());
    }
}
