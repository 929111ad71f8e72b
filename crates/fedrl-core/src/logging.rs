//! tracing subscriber setup shared by the binaries.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogConfig;
use crate::error::{FedrlError, Result};

/// Install the global subscriber: compact stderr output, plus JSON lines to
/// `config.file` when set. `RUST_LOG` wins over `config.level`.
///
/// Keep the returned guard alive for the life of the process, otherwise
/// buffered file output is lost.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let stderr = fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let Some(path) = &config.file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr)
            .try_init()
            .map_err(|e| FedrlError::Other(e.to_string()))?;
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| FedrlError::Config(format!("log file has no name: {}", path.display())))?;
    crate::storage::ensure_dir(&dir)?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    let file = fmt::layer().json().with_ansi(false).with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init()
        .map_err(|e| FedrlError::Other(e.to_string()))?;
    Ok(Some(guard))
}
