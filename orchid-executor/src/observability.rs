//! Tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// The filter is read from the `ORCHID_LOG` environment variable and falls
/// back to `info`. Subsequent calls are no-ops, so tests and embedding
/// applications may call this freely.
///
/// # Example
///
/// ```ignore
/// orchid_executor::observability::init_tracing();
/// ```
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("ORCHID_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}
