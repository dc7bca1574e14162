//! Logger setup.
//!
//! The library only emits records through the `log` facade. Hosts that do not bring their
//! own logger can call [`init`] once at startup.

use log::LevelFilter;

/// Installs an `env_logger` logger with the given default level.
///
/// `RUST_LOG` still takes precedence for individual modules. Calling this more than once
/// is harmless, later calls are ignored.
pub fn init(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Same as [`init`], but captures output in the test harness.
#[cfg(test)]
pub(crate) fn init_for_tests() {
    let _ = env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
