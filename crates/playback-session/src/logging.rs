//! Tracing subscriber setup for hosts embedding this crate.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "playback_session=info";

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `filter` when set. Returns an error if a
/// global subscriber is already installed.
pub fn init(filter: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()
}

/// Install a test-writer subscriber, ignoring "already installed" errors.
pub fn try_init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("playback_session=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}
