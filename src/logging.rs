use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

const DEFAULT_FILTER: &str = "magic_sprites=info";

/// Install a stdout subscriber filtered by `RUST_LOG`, falling back to info
/// level output for this crate.
///
/// Fails if a global subscriber is already set.
pub fn init_logging() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .try_init()
}
