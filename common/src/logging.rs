use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber used by every tool.
///
/// The filter comes from `RUST_LOG` and falls back to `default_level`.
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::Layer::default()
            .with_target(false)
            .with_thread_names(false)
            .with_ansi(true)
            .with_line_number(false)
            .with_file(false)
            .with_thread_ids(false),
    );
    tracing::subscriber::set_global_default(subscriber)
        .expect("Unable to set a global logger instance");
}
