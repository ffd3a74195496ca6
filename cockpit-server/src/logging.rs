//! Console plus daily-rotated file logging.

use std::path::Path;

use cockpit_core::modules::paths::{self, LOGS_DIR};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "cockpit.log";

struct LocalTimer;

impl fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().to_rfc3339())
    }
}

/// Install the global subscriber. Keep the guard alive for the whole process
/// or buffered file output is lost.
pub fn init(data_dir: &Path, level: &str) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer().with_target(false).with_timer(LocalTimer);

    let log_dir = data_dir.join(LOGS_DIR);
    let (file_layer, guard) = match paths::ensure_dir(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        },
        Err(e) => {
            eprintln!("Failed to initialize log directory: {}", e);
            (None, None)
        },
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    guard
}
