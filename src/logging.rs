use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{debug, info, metadata::LevelFilter, trace, Level};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::prelude::*;

/// Where log records go, and how verbose each destination is.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Level for stdout, or `None` to leave stdout alone (e.g. when detached).
    pub stdout: Option<Level>,

    /// Level and directory for a daily rolling log file.
    pub file: Option<(Level, PathBuf)>,

    /// Log file name, before the rotation date suffix.
    pub file_name: String,
}

impl LogSettings {
    /// Only stdout, at `level`.
    pub fn stdout(level: Level) -> Self {
        Self {
            stdout: Some(level),
            file: None,
            file_name: "serial-lookout.log".into(),
        }
    }
}

fn do_init(settings: LogSettings) -> Option<WorkerGuard> {
    let mut message = String::from("Logging with:");

    let stdout_layer = settings.stdout.map(|level| {
        message += " stdout";

        tracing_subscriber::fmt::layer().with_filter(LevelFilter::from(level))
    });

    let (file_layer, guard) = match settings.file {
        Some((level, output_dir)) => {
            message += &format!(" file {:?}", output_dir.join(&settings.file_name));

            let file_appender =
                RollingFileAppender::new(Rotation::DAILY, output_dir, &settings.file_name);
            let (writer, guard) = tracing_appender::non_blocking(file_appender);

            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(LevelFilter::from(level));

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    debug!(message);

    guard
}

/// Initialize tracing.
///
/// Will only initialize once, so tests may call this.
/// When logging to a file, the returned guard must be kept alive until exit,
/// see [`shutdown`].
pub async fn init(settings: LogSettings) -> Option<WorkerGuard> {
    static TRACING_IS_INITIALIZED: RwLock<bool> = RwLock::const_new(false);

    if *TRACING_IS_INITIALIZED.read().await {
        return None;
    }

    let mut initialized = TRACING_IS_INITIALIZED.write().await;

    // Someone may have won the race between the `.read()` and the `.write()`.
    if *initialized {
        return None;
    }

    let guard = do_init(settings);
    *initialized = true;

    info!("Logging initialized");

    guard
}

/// Flush records still buffered for the log file.
pub fn shutdown(guard: Option<WorkerGuard>) {
    trace!("Shutting down");
    drop(guard);
}
