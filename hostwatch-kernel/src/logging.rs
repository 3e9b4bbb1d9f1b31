use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "hostwatch_kernel=info";
/// Rotated warning logs kept on disk, the live one included
const MAX_LOG_FILES: usize = 5;

/// Console output filtered by `RUST_LOG`, plus warnings and errors written to
/// a daily-rotated `log_file` when one is given.
///
/// The returned guard flushes the file writer on drop and must live as long
/// as the process.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let console = fmt::layer().with_target(false).with_filter(console_filter);

    let (file, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(LevelFilter::WARN);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("logging already initialised")?;
    Ok(guard)
}

/// `logs/hostwatch.log` rolls into `logs/hostwatch.<date>.log`.
fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let (dir, prefix, suffix) = rolling_parts(path);
    let mut builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_LOG_FILES);
    if let Some(suffix) = suffix {
        builder = builder.filename_suffix(suffix);
    }
    builder
        .build(&dir)
        .with_context(|| format!("cannot open log file {}", path.display()))
}

fn rolling_parts(path: &Path) -> (PathBuf, String, Option<String>) {
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "hostwatch".to_string());
    let suffix = path.extension().map(|s| s.to_string_lossy().into_owned());
    (dir, prefix, suffix)
}
