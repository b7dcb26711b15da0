//! Process-wide logger handle
//!
//! Nothing is installed implicitly: call [`init`] or [`init_with`] first and
//! [`shutdown`] before exit so buffered records reach their sinks.
//!
//! ```
//! use rust_log_engine::config::{LoggerConfig, SinkConfig, WorkerConfig};
//! use rust_log_engine::global;
//!
//! let config = LoggerConfig {
//!     name: "app".to_string(),
//!     workers: vec![WorkerConfig::new(SinkConfig::Stderr)],
//!     ..LoggerConfig::default()
//! };
//! global::init(config).unwrap();
//!
//! if let Some(logger) = global::logger() {
//!     logger.info("started");
//! }
//! global::shutdown();
//! ```

use crate::config::LoggerConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::logger::Logger;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

static GLOBAL: Lazy<RwLock<Option<Logger>>> = Lazy::new(|| RwLock::new(None));

/// Build a logger from `config` and install it.
///
/// # Errors
///
/// Fails when the configuration is invalid or a logger is already installed.
pub fn init(config: LoggerConfig) -> Result<()> {
    init_with(config.build()?)
}

/// Install an already built logger
pub fn init_with(logger: Logger) -> Result<()> {
    let mut slot = GLOBAL.write();
    if slot.is_some() {
        return Err(LoggerError::config(
            "global",
            "a logger is already installed; call shutdown() first",
        ));
    }
    *slot = Some(logger);
    Ok(())
}

/// Clone of the installed logger
pub fn logger() -> Option<Logger> {
    GLOBAL.read().clone()
}

pub fn is_initialized() -> bool {
    GLOBAL.read().is_some()
}

/// Remove the installed logger and stop its engine.
///
/// Returns `false` if nothing was installed or the engine did not drain in
/// time.
pub fn shutdown() -> bool {
    let installed = GLOBAL.write().take();
    match installed {
        Some(logger) => logger.stop(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_level::LogLevel;
    use crate::sinks::ConsoleSink;

    // One test owns the global slot so parallel tests cannot interfere
    #[test]
    fn test_install_use_and_shutdown() {
        assert!(!shutdown());

        let first = Logger::builder()
            .name("global")
            .sink(ConsoleSink::stderr())
            .build()
            .unwrap();
        init_with(first).unwrap();
        assert!(is_initialized());

        let second = Logger::builder().sink(ConsoleSink::stderr()).build().unwrap();
        assert!(matches!(
            init_with(second),
            Err(LoggerError::InvalidConfiguration { .. })
        ));

        let handle = super::logger().unwrap();
        assert_eq!(handle.name(), "global");
        handle.log(LogLevel::Info, "through the global handle");

        assert!(shutdown());
        assert!(!is_initialized());
        assert!(handle.is_stopped());
    }
}
