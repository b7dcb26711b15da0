//! Log record structure

use super::caller::CallerInfo;
use super::log_context::LogContext;
use super::log_level::LogLevel;
use chrono::{DateTime, Local};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

// Per-thread identity is computed once and reused for every record
thread_local! {
    static THREAD_ID_CACHE: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

/// Small numeric id of the calling thread, stable for the thread's lifetime
pub fn current_thread_id() -> u64 {
    THREAD_ID_CACHE.with(|id| *id)
}

fn current_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// One log event. Immutable once handed to the engine, where it is shared
/// between workers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub logger_name: String,
    pub level: LogLevel,
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub trace_id: Option<String>,
    pub thread_id: u64,
    pub thread_name: Option<String>,
    pub caller: Option<CallerInfo>,
    pub extras: Option<LogContext>,
}

impl LogRecord {
    pub fn new(logger_name: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            logger_name: logger_name.into(),
            level,
            timestamp: Local::now(),
            message: message.into(),
            trace_id: None,
            thread_id: current_thread_id(),
            thread_name: current_thread_name(),
            caller: None,
            extras: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_caller(mut self, caller: CallerInfo) -> Self {
        self.caller = Some(caller);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_extras(mut self, extras: LogContext) -> Self {
        if !extras.is_empty() {
            self.extras = Some(extras);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_cached_per_thread() {
        let a = LogRecord::new("t", LogLevel::Info, "a");
        let b = LogRecord::new("t", LogLevel::Info, "b");
        assert_eq!(a.thread_id, b.thread_id);

        let other = std::thread::spawn(|| LogRecord::new("t", LogLevel::Info, "c").thread_id)
            .join()
            .unwrap();
        assert_ne!(a.thread_id, other);
    }

    #[test]
    fn test_thread_name() {
        let name = std::thread::Builder::new()
            .name("log-producer".into())
            .spawn(|| LogRecord::new("t", LogLevel::Info, "x").thread_name)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(name.as_deref(), Some("log-producer"));
    }

    #[test]
    fn test_empty_extras_dropped() {
        let record = LogRecord::new("t", LogLevel::Info, "x").with_extras(LogContext::new());
        assert!(record.extras.is_none());
    }
}
