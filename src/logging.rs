// src/logging.rs
//! Tracing subscriber setup for the binary

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Checked before `RUST_LOG`.
pub const LOG_ENV: &str = "GPS_TIMESYNC_LOG";

/// Filter directives: `GPS_TIMESYNC_LOG`, then `RUST_LOG`, then `info`
/// (`debug` when `debug` is set).
pub fn filter_directives(debug: bool) -> String {
    std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .unwrap_or_else(|_| default_level(debug).to_string())
}

fn default_level(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Install the global subscriber. Logs go to stderr so monitor output on
/// stdout stays clean. Calling twice is harmless.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_new(filter_directives(debug))
        .unwrap_or_else(|_| EnvFilter::new(default_level(debug)));

    let _ = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(false), "info");
        assert_eq!(default_level(true), "debug");
    }

    #[test]
    fn test_init_twice() {
        init(false);
        init(true);
        tracing::info!("still fine");
    }
}
