//! Tracing setup for the `ledit` binary.
//!
//! Logs go to stderr in compact format so they never mix with command
//! output. `RUST_LOG` wins over the configured level.

use ledit_protocol::ExecutionSettings;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Level for a process run: the process's own `log_level` when it sets one
/// other than the default, else the configured level.
pub fn level_for<'a>(settings: &'a ExecutionSettings, configured: &'a str) -> &'a str {
    let level = settings.log_level.trim();
    if level.is_empty() || level == ExecutionSettings::default().log_level {
        configured
    } else {
        level
    }
}
