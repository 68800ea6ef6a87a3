//! Structured logging to the console and an append-only local file.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogConfig;

/// Initialize the global logger: timestamped lines to stdout and to the
/// configured log file. `RUST_LOG` overrides the configured level.
pub fn init(config: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_appender = tracing_appender::rolling::never(".", &config.file);
    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
