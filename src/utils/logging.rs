//! Logging initialization.
//!
//! Respects `RUST_LOG` (standard practice, always takes precedence),
//! falls back to a filter supplied from config, and defaults to "info".

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `filter` comes from config (e.g. `--log-level` or a JSON config key);
/// `RUST_LOG`, if set, always wins.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(filter.unwrap_or("info"))
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    #[cfg(feature = "json-logging")]
    {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .init();
        return;
    }

    #[cfg(not(feature = "json-logging"))]
    registry
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .init();
}
