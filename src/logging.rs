//! Tracing bootstrap for the CLI.

use tracing_subscriber::EnvFilter;

/// App-specific filter variable, consulted when `RUST_LOG` is unset.
pub const LOG_ENV: &str = "ROOMSHARE_LOG";

const DEFAULT_FILTER: &str = "warn,roomshare=info,roomshare_core=info";

/// Installs the global subscriber, writing to stderr so command output on
/// stdout stays clean.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `ROOMSHARE_LOG`
/// 3) internal default filter
pub fn init() {
    let filter = select_filter(
        std::env::var("RUST_LOG").ok(),
        std::env::var(LOG_ENV).ok(),
    );
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_env_filter(filter)
        .try_init();
}

fn select_filter(rust_log: Option<String>, app_log: Option<String>) -> EnvFilter {
    [rust_log, app_log]
        .into_iter()
        .flatten()
        .filter(|v| !v.trim().is_empty())
        .find_map(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
