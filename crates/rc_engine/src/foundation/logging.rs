//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
///
/// `filters` uses the `env_logger` filter syntax (`"info"`, `"rc_engine=debug"`).
/// `RUST_LOG` still overrides it when set. Returns `false` if a logger was
/// already installed, which is the normal case in tests.
pub fn init(filters: &str) -> bool {
    env_logger::Builder::new()
        .parse_filters(filters)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
