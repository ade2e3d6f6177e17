//! Logging setup for kaiwa binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Levels accepted by the `--log` flag.
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Normalize a user supplied level (`DEBUG`, `Info`, ...) into a filter directive.
///
/// Unknown values fall back to `info`.
pub fn normalize_level(level: &str) -> &'static str {
    let lowered = level.trim().to_ascii_lowercase();
    LEVELS
        .iter()
        .find(|candidate| **candidate == lowered)
        .copied()
        .unwrap_or("info")
}

/// Build the default filter directive used when `RUST_LOG` is not set.
pub fn default_directive(binary_name: &str, default_log_level: &str) -> String {
    let level = normalize_level(default_log_level);
    let binary_target = binary_name.replace('-', "_");
    if binary_target == "kaiwa_server" {
        format!("kaiwa_server={level},tower_http={level}")
    } else {
        format!("kaiwa_server={level},{binary_target}={level},tower_http={level}")
    }
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// HTTP request spans from `tower_http` share the same level. The level can be overridden using the `RUST_LOG` environment variable.
///
/// # Examples
///
/// ```no_run
/// use kaiwa_shared::logger::setup_logger;
///
/// setup_logger("kaiwa-server", "DEBUG");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
