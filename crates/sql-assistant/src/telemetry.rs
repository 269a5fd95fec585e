// sql-assistant/crates/sql-assistant/src/telemetry.rs

use tracing_subscriber::{fmt, EnvFilter};

const FALLBACK_LEVEL: &str = "info";

/// `RUST_LOG` if it parses, then the configured level, then `info`
fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
}

/// Install the global subscriber. Returns false if one was already installed.
pub fn init_tracing(default_level: &str) -> bool {
    let subscriber = fmt()
        .with_env_filter(build_filter(default_level))
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
