use std::{fs::File, io, path::Path};

use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer};

pub const LOG_FILE: &str = "kubereport.log";

/// Builds the subscriber for one run without installing it globally.
///
/// With a log directory, events go through a non-blocking writer to
/// `<dir>/kubereport.log`; the returned guard must outlive the run or the
/// tail of the log is lost. Without one, events go to stderr. `RUST_LOG`
/// overrides the default `info` filter.
pub fn setup_logger(log_dir: Option<&Path>) -> io::Result<(Dispatch, Option<WorkerGuard>)> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let file = File::create(dir.join(LOG_FILE))?;
            let (non_blocking_writer, guard) = tracing_appender::non_blocking(file);

            let file_layer = fmt::layer()
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(non_blocking_writer)
                .with_filter(filter());

            let registry = tracing_subscriber::registry().with(file_layer);
            Ok((Dispatch::new(registry), Some(guard)))
        }
        None => {
            let stderr_layer = fmt::layer()
                .with_target(false)
                .with_writer(io::stderr)
                .with_filter(filter());

            let registry = tracing_subscriber::registry().with(stderr_layer);
            Ok((Dispatch::new(registry), None))
        }
    }
}
