use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_LOG_LEVEL;

// Server NOTICEs such as "relation already exists, skipping" arrive at INFO.
const QUIET_NOTICES: &str = "sqlx::postgres::notice=warn";

/// Filter for a plain level name such as `warn`.
pub fn level_filter(level: &str) -> EnvFilter {
    let directives = match level {
        "trace" | "debug" | "info" => format!("{level},{QUIET_NOTICES}"),
        _ => level.to_string(),
    };
    EnvFilter::try_new(directives)
        .unwrap_or_else(|_| EnvFilter::new(format!("{DEFAULT_LOG_LEVEL},{QUIET_NOTICES}")))
}

/// Install the global fmt subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
