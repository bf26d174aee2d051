use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{Config, Environment, LogRotation};
use crate::error::{AppError, Result};

/// Install the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`.
///
/// When `LOG_DIR` is set, ERROR events are also appended to a rolling
/// `error.log` there. The returned guard flushes that file and must be held
/// until shutdown.
pub fn init_tracing(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout: Box<dyn Layer<Registry> + Send + Sync> = match config.environment {
        Environment::Production => Box::new(fmt::layer().json()),
        Environment::Development => Box::new(fmt::layer()),
    };

    let (error_file, guard) = match error_file_layer(config)? {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout.with_filter(filter))
        .with(error_file)
        .init();

    Ok(guard)
}

/// ERROR-only layer writing to the rotating file under `config.log_dir`.
fn error_file_layer<S>(config: &Config) -> Result<Option<(impl Layer<S> + Send + Sync, WorkerGuard)>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let Some(dir) = &config.log_dir else {
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::Config(format!("Failed to create log directory {}: {e}", dir.display())))?;

    let rotation = match config.log_rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    };
    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix("error")
        .filename_suffix("log")
        .max_log_files(config.log_max_files)
        .build(dir)
        .map_err(|e| AppError::Config(format!("Failed to open error log in {}: {e}", dir.display())))?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    Ok(Some((layer, guard)))
}
