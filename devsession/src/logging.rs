//! Logging setup
//!
//! The library only emits `tracing` events; binaries call [`init`] once to
//! install a stderr subscriber.

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Install a stderr fmt subscriber filtered by `config.log_filter`.
///
/// An unparseable filter falls back to `info`. Returns `false` if a global
/// subscriber was already installed (e.g. by a test harness).
pub fn init(config: &Config) -> bool {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|e| {
        eprintln!(
            "Warning: invalid log filter {:?} ({}), using \"info\"",
            config.log_filter, e
        );
        EnvFilter::new("info")
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
