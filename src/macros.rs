//! Logging macros for ergonomic log message formatting.
//!
//! The level check runs before the arguments are formatted, and the record
//! carries the caller's `module_path!()` as its function name.
//!
//! # Examples
//!
//! ```
//! use rust_log_engine::prelude::*;
//! use rust_log_engine::info;
//!
//! let logger = Logger::builder().sink(ConsoleSink::stderr()).build().unwrap();
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! # logger.stop();
//! ```

/// Log a message at an explicit level.
///
/// # Examples
///
/// ```
/// # use rust_log_engine::prelude::*;
/// # let logger = Logger::builder().sink(ConsoleSink::stderr()).build().unwrap();
/// use rust_log_engine::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// # logger.stop();
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled(level) {
            logger.log_at(
                level,
                format!($($arg)+),
                None,
                $crate::CallSite::here(Some(module_path!())),
            );
        }
    }};
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log a print-level message. Named to avoid clashing with `std::print!`.
#[macro_export]
macro_rules! log_print {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Print, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_engine::prelude::*;
/// # let logger = Logger::builder().sink(ConsoleSink::stderr()).build().unwrap();
/// use rust_log_engine::info;
/// info!(logger, "Processing {} items", 100);
/// # logger.stop();
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a panic-level message with a stack dump. Named to avoid clashing with
/// `std::panic!`.
#[macro_export]
macro_rules! log_panic {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Panic, $($arg)+)
    };
}

/// Log a fatal-level message with a stack dump.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{LogLevel, LogRecord, Logger, Result, WorkerSpec};
    use crate::sinks::Sink;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct MemorySink(Arc<Mutex<Vec<LogRecord>>>);

    impl Sink for MemorySink {
        fn emit(&mut self, record: &LogRecord) -> Result<()> {
            self.0.lock().push(record.clone());
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
        fn name(&self) -> &str {
            "memory"
        }
    }

    fn logger(sink: &MemorySink) -> Logger {
        Logger::builder()
            .level(LogLevel::Debug)
            .worker(WorkerSpec::new(sink.clone()).threshold(LogLevel::Debug))
            .build()
            .unwrap()
    }

    #[test]
    fn test_level_macros() {
        let sink = MemorySink::default();
        let logger = logger(&sink);
        debug!(logger, "Debug message");
        log_print!(logger, "Count: {}", 5);
        info!(logger, "Items: {}", 100);
        warn!(logger, "Retry {} of {}", 1, 3);
        error!(logger, "Code: {}", 500);
        log!(logger, LogLevel::Info, "Formatted: {}", 42);
        logger.stop();

        let records = sink.0.lock();
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["Debug message", "Count: 5", "Items: 100", "Retry 1 of 3", "Code: 500", "Formatted: 42"]
        );
        assert_eq!(records[1].level, LogLevel::Print);
    }

    #[test]
    fn test_macro_records_module_and_line() {
        let sink = MemorySink::default();
        let logger = logger(&sink);
        let line = line!() + 1;
        info!(logger, "located");
        logger.stop();

        let records = sink.0.lock();
        let caller = records[0].caller.as_ref().unwrap();
        assert_eq!(caller.line, line);
        assert!(caller.function.ends_with("macros::tests"));
        assert!(caller.file.ends_with("macros.rs"));
    }

    #[test]
    fn test_disabled_level_skips_formatting() {
        let sink = MemorySink::default();
        let logger = logger(&sink);
        logger.set_level(LogLevel::Error);

        let formatted = std::cell::Cell::new(false);
        let expensive = || {
            formatted.set(true);
            "expensive"
        };
        info!(logger, "{}", expensive());
        logger.stop();

        assert!(!formatted.get());
        assert!(sink.0.lock().is_empty());
    }
}
