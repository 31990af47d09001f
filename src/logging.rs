//! Structured logging setup using `tracing-subscriber`.
//!
//! Two modes, both writing to stderr so stdout stays clean for results:
//! - **Console** ([`init_cli`]): human-readable lines
//! - **JSON** ([`init_json`]): one JSON object per event, for log collectors
//!
//! Both are controlled by `RUST_LOG` (default: `info`).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialise human-readable console logging.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_cli() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}

/// Initialise JSON logging.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_json() -> anyhow::Result<()> {
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}
