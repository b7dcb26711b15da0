//! Logger facade

use super::caller::{CallSite, CallerResolver, LocationResolver, SharedResolver};
use super::engine::{DispatchEngine, WorkerSpec};
use super::error::{default_error_callback, ErrorCallback, Result};
use super::log_context::LogContext;
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use super::metrics::EngineMetrics;
use crate::config::{LoggerConfig, WorkerConfig};
use crate::sinks::Sink;
use parking_lot::RwLock;
use std::backtrace::Backtrace;
use std::sync::Arc;

/// Supplies the trace id attached to each record
pub type TraceIdFn = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Called with exit status 1 when the throw level is reached
pub type ExitFn = Arc<dyn Fn(i32) + Send + Sync>;

/// Cheap to clone; clones share the engine and the level.
#[derive(Clone)]
pub struct Logger {
    name: String,
    level: Arc<RwLock<LogLevel>>,
    throw_on: LogLevel,
    trace_id: Option<TraceIdFn>,
    resolver: Option<SharedResolver>,
    exit: Option<ExitFn>,
    engine: Arc<DispatchEngine>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child logger with its own name and level, writing to the same engine
    pub fn named(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: Arc::new(RwLock::new(self.level())),
            ..self.clone()
        }
    }

    pub fn level(&self) -> LogLevel {
        *self.level.read()
    }

    pub fn set_level(&self, level: LogLevel) {
        *self.level.write() = level;
    }

    pub fn throw_on_level(&self) -> LogLevel {
        self.throw_on
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level >= self.level()
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.is_enabled(level) {
            return;
        }
        self.log_at(level, message.into(), None, CallSite::here(None));
    }

    /// Log with structured key/value fields
    #[track_caller]
    pub fn log_with_context(&self, level: LogLevel, message: impl Into<String>, context: LogContext) {
        if !self.is_enabled(level) {
            return;
        }
        self.log_at(level, message.into(), Some(context), CallSite::here(None));
    }

    /// Entry point used by the logging macros, which check
    /// [`is_enabled`](Self::is_enabled) before formatting the message.
    pub fn log_at(&self, level: LogLevel, message: String, context: Option<LogContext>, site: CallSite) {
        if !self.is_enabled(level) {
            return;
        }

        let mut record = LogRecord::new(self.name.as_str(), level, message);
        if let Some(trace_id) = self.trace_id.as_ref().and_then(|f| f()) {
            record = record.with_trace_id(trace_id);
        }
        if let Some(caller) = self.resolver.as_ref().and_then(|r| r.resolve(&site)) {
            record = record.with_caller(caller);
        }
        if let Some(context) = context {
            record = record.with_extras(context);
        }

        let throw_message = (level >= self.throw_on).then(|| record.message.clone());

        if level >= LogLevel::Panic {
            let stack_template = record.clone();
            let _ = self.engine.send(record);
            self.emit_stack(stack_template);
        } else {
            // Failures already went to the error callback
            let _ = self.engine.send(record);
        }

        if let Some(message) = throw_message {
            self.throw(level, message);
        }
    }

    fn emit_stack(&self, template: LogRecord) {
        let trace = Backtrace::force_capture().to_string();
        for frame in trace.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let record = LogRecord {
                message: format!("#STACK: {}", frame),
                extras: None,
                ..template.clone()
            };
            let _ = self.engine.send(record);
        }
    }

    // Every sink is drained and synced before the process goes away
    fn throw(&self, level: LogLevel, message: String) {
        self.engine.stop();
        match &self.exit {
            Some(exit) => exit(1),
            None if level == LogLevel::Panic => panic!("{}", message),
            None => std::process::exit(1),
        }
    }

    #[track_caller]
    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[track_caller]
    #[inline]
    pub fn print(&self, message: impl Into<String>) {
        self.log(LogLevel::Print, message);
    }

    #[track_caller]
    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[track_caller]
    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[track_caller]
    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Logs with a stack dump. Unwinds only when the throw level is reached
    /// and no exit function is set.
    #[track_caller]
    #[inline]
    pub fn panic(&self, message: impl Into<String>) {
        self.log(LogLevel::Panic, message);
    }

    /// Logs with a stack dump. Exits only when the throw level is reached.
    #[track_caller]
    #[inline]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    /// Drain every worker, close every sink. Shared by all clones.
    pub fn stop(&self) -> bool {
        self.engine.stop()
    }

    pub fn is_stopped(&self) -> bool {
        self.engine.is_stopped()
    }

    /// Get the engine metrics for detailed observability
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_engine::prelude::*;
    ///
    /// let logger = Logger::builder()
    ///     .sink(ConsoleSink::stderr())
    ///     .build()
    ///     .unwrap();
    ///
    /// logger.info("ready");
    /// logger.stop();
    ///
    /// let metrics = logger.metrics();
    /// println!("Delivered: {}", metrics.delivered());
    /// println!("Drop rate: {:.2}%", metrics.drop_rate());
    /// ```
    pub fn metrics(&self) -> &EngineMetrics {
        self.engine.metrics()
    }

    pub fn engine(&self) -> &Arc<DispatchEngine> {
        &self.engine
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("throw_on", &self.throw_on)
            .field("record_caller", &self.resolver.is_some())
            .field("engine", &self.engine)
            .finish()
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rust_log_engine::prelude::*;
/// use std::sync::Arc;
///
/// let logger = Logger::builder()
///     .name("api")
///     .level(LogLevel::Debug)
///     .worker(
///         WorkerSpec::new(ConsoleSink::stderr())
///             .capacity(256)
///             .threshold(LogLevel::Info),
///     )
///     .trace_id_fn(|| Some("req-1".to_string()))
///     .on_error(Arc::new(|err: &LoggerError| eprintln!("ALERT: {}", err)))
///     .build()
///     .unwrap();
///
/// logger.info("hello");
/// logger.stop();
/// ```
#[must_use = "builder methods return a new value"]
pub struct LoggerBuilder {
    name: String,
    level: LogLevel,
    throw_on: LogLevel,
    record_caller: bool,
    resolver: SharedResolver,
    trace_id: Option<TraceIdFn>,
    exit: Option<ExitFn>,
    workers: Vec<WorkerSpec>,
    worker_configs: Vec<WorkerConfig>,
    on_error: Option<ErrorCallback>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        let defaults = LoggerConfig::default();
        Self {
            name: defaults.name,
            level: defaults.level,
            throw_on: defaults.throw_on_level,
            record_caller: defaults.record_caller,
            resolver: Arc::new(LocationResolver),
            trace_id: None,
            exit: None,
            workers: Vec::new(),
            worker_configs: Vec::new(),
            on_error: None,
        }
    }

    /// Take name, levels, caller capture and workers from a configuration
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.name = config.name;
        self.level = config.level;
        self.throw_on = config.throw_on_level;
        self.record_caller = config.record_caller;
        self.worker_configs.extend(config.workers);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Records at or above this level stop the engine and exit.
    /// `LogLevel::None` (the default) never triggers.
    pub fn throw_on_level(mut self, level: LogLevel) -> Self {
        self.throw_on = level;
        self
    }

    pub fn record_caller(mut self, enabled: bool) -> Self {
        self.record_caller = enabled;
        self
    }

    pub fn caller_resolver(mut self, resolver: impl CallerResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn trace_id_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.trace_id = Some(Arc::new(f));
        self
    }

    /// Replaces process termination when the throw level is reached
    pub fn exit_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        self.exit = Some(Arc::new(f));
        self
    }

    pub fn worker(mut self, worker: WorkerSpec) -> Self {
        self.workers.push(worker);
        self
    }

    /// Add a worker with default capacity, threshold and policy
    pub fn sink(self, sink: impl Sink + 'static) -> Self {
        self.worker(WorkerSpec::new(sink))
    }

    pub fn on_error(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    pub fn build(self) -> Result<Logger> {
        let on_error = self.on_error.unwrap_or_else(default_error_callback);

        let mut configs = self.worker_configs;
        if configs.is_empty() && self.workers.is_empty() {
            configs = LoggerConfig::default().effective_workers();
        }

        let mut workers = self.workers;
        for config in &configs {
            config.validate()?;
            let formatter = config.formatter.build()?;
            let sink = config
                .sink
                .build(Box::new(formatter), config.filter(), Arc::clone(&on_error))?;
            workers.push(
                WorkerSpec::boxed(sink)
                    .capacity(config.cache_size)
                    .threshold(config.level)
                    .backpressure(config.backpressure),
            );
        }

        let engine = DispatchEngine::new(workers, on_error)?;
        Ok(Logger {
            name: self.name,
            level: Arc::new(RwLock::new(self.level)),
            throw_on: self.throw_on,
            trace_id: self.trace_id,
            resolver: self.record_caller.then_some(self.resolver),
            exit: self.exit,
            engine: Arc::new(engine),
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::caller::CallerInfo;
    use crate::core::error::LoggerError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    #[derive(Clone, Default)]
    struct MemorySink {
        records: Arc<Mutex<Vec<LogRecord>>>,
        closed: Arc<AtomicBool>,
    }

    impl MemorySink {
        fn messages(&self) -> Vec<String> {
            self.records.lock().iter().map(|r| r.message.clone()).collect()
        }
    }

    impl Sink for MemorySink {
        fn emit(&mut self, record: &LogRecord) -> Result<()> {
            self.records.lock().push(record.clone());
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn name(&self) -> &str {
            "memory"
        }
    }

    fn logger_with(sink: &MemorySink) -> LoggerBuilder {
        Logger::builder()
            .name("test")
            .level(LogLevel::Debug)
            .worker(WorkerSpec::new(sink.clone()).threshold(LogLevel::Debug))
    }

    #[test]
    fn test_below_threshold_skipped() {
        let sink = MemorySink::default();
        let logger = logger_with(&sink).level(LogLevel::Warn).build().unwrap();

        logger.info("hidden");
        logger.warn("shown");
        logger.log(LogLevel::None, "never");
        logger.stop();

        assert_eq!(sink.messages(), vec!["shown"]);
        assert!(!logger.is_enabled(LogLevel::Info));
        assert!(logger.is_enabled(LogLevel::Error));
    }

    #[test]
    fn test_set_level_at_runtime() {
        let sink = MemorySink::default();
        let logger = logger_with(&sink).build().unwrap();
        logger.debug("one");
        logger.set_level(LogLevel::Error);
        logger.debug("two");
        logger.stop();
        assert_eq!(sink.messages(), vec!["one"]);
        assert_eq!(logger.level(), LogLevel::Error);
    }

    #[test]
    fn test_caller_points_at_call_site() {
        let sink = MemorySink::default();
        let logger = logger_with(&sink).build().unwrap();
        let line = line!() + 1;
        logger.info("here");
        logger.stop();

        let records = sink.records.lock();
        let caller = records[0].caller.as_ref().unwrap();
        assert!(caller.file.ends_with("logger.rs"));
        assert_eq!(caller.line, line);
        assert_eq!(caller.function, "logger");
    }

    #[test]
    fn test_caller_capture_disabled() {
        let sink = MemorySink::default();
        let resolved = Arc::new(AtomicBool::new(false));
        let flag = resolved.clone();
        let logger = logger_with(&sink)
            .record_caller(false)
            .caller_resolver(move |_: &CallSite| {
                flag.store(true, Ordering::SeqCst);
                Some(CallerInfo::new("x.rs", "f", 1))
            })
            .build()
            .unwrap();
        logger.info("no caller");
        logger.stop();

        assert!(!resolved.load(Ordering::SeqCst));
        assert!(sink.records.lock()[0].caller.is_none());
    }

    #[test]
    fn test_trace_id_and_context() {
        let sink = MemorySink::default();
        let logger = logger_with(&sink)
            .trace_id_fn(|| Some("abc-123".to_string()))
            .build()
            .unwrap();
        logger.log_with_context(
            LogLevel::Info,
            "request",
            LogContext::new().with_field("status", 200),
        );
        logger.stop();

        let records = sink.records.lock();
        assert_eq!(records[0].trace_id.as_deref(), Some("abc-123"));
        assert_eq!(records[0].extras.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_named_shares_engine() {
        let sink = MemorySink::default();
        let root = logger_with(&sink).build().unwrap();
        let child = root.named("db");
        child.info("from child");
        root.info("from root");
        root.stop();

        let records = sink.records.lock();
        assert_eq!(records[0].logger_name, "db");
        assert_eq!(records[1].logger_name, "test");
        assert!(child.is_stopped());
    }

    #[test]
    fn test_fatal_without_throw_only_logs() {
        let sink = MemorySink::default();
        let logger = logger_with(&sink).build().unwrap();
        logger.fatal("bad but alive");
        logger.info("still running");
        logger.stop();

        let messages = sink.messages();
        assert_eq!(messages[0], "bad but alive");
        assert!(messages[1..messages.len() - 1]
            .iter()
            .all(|m| m.starts_with("#STACK: ")));
        assert_eq!(messages.last().map(String::as_str), Some("still running"));
    }

    #[test]
    fn test_throw_stops_engine_before_exit() {
        let sink = MemorySink::default();
        let closed = sink.closed.clone();
        let code = Arc::new(AtomicI32::new(-1));
        let closed_at_exit = Arc::new(AtomicBool::new(false));
        let (code_seen, closed_seen) = (code.clone(), closed_at_exit.clone());

        let logger = logger_with(&sink)
            .throw_on_level(LogLevel::Fatal)
            .exit_fn(move |c| {
                code_seen.store(c, Ordering::SeqCst);
                closed_seen.store(closed.load(Ordering::SeqCst), Ordering::SeqCst);
            })
            .build()
            .unwrap();

        logger.fatal("goodbye");
        assert_eq!(code.load(Ordering::SeqCst), 1);
        assert!(closed_at_exit.load(Ordering::SeqCst));
        assert_eq!(sink.messages()[0], "goodbye");
        assert!(logger.is_stopped());
    }

    #[test]
    fn test_throw_below_panic_level() {
        let sink = MemorySink::default();
        let code = Arc::new(AtomicI32::new(-1));
        let code_seen = code.clone();

        let logger = logger_with(&sink)
            .throw_on_level(LogLevel::Error)
            .exit_fn(move |c| code_seen.store(c, Ordering::SeqCst))
            .build()
            .unwrap();

        logger.warn("not yet");
        assert_eq!(code.load(Ordering::SeqCst), -1);
        assert!(!logger.is_stopped());

        logger.error("disk gone");
        assert_eq!(code.load(Ordering::SeqCst), 1);
        assert!(logger.is_stopped());
        // No stack dump below the panic level
        assert_eq!(sink.messages(), vec!["not yet", "disk gone"]);
    }

    #[test]
    #[should_panic(expected = "unrecoverable")]
    fn test_panic_unwinds_without_exit_fn() {
        let sink = MemorySink::default();
        let logger = logger_with(&sink)
            .throw_on_level(LogLevel::Panic)
            .on_error(Arc::new(|_: &LoggerError| {}))
            .build()
            .unwrap();
        logger.panic("unrecoverable");
    }

    #[test]
    fn test_default_builder_uses_stdout_worker() {
        let logger = Logger::builder().build().unwrap();
        assert_eq!(logger.engine().worker_count(), 1);
        assert_eq!(logger.level(), LogLevel::Print);
        logger.stop();
    }
}
