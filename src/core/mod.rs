//! Core logger types and traits

pub mod backpressure;
pub mod caller;
pub mod engine;
pub mod error;
pub mod filter;
pub mod formatter;
pub mod log_context;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod metrics;
pub mod pattern;

pub use backpressure::BackpressurePolicy;
pub use caller::{CallSite, CallerInfo, CallerResolver, LocationResolver, SharedResolver};
pub use engine::{DispatchEngine, WorkerSpec, DEFAULT_SHUTDOWN_TIMEOUT};
pub use error::{default_error_callback, ErrorCallback, LoggerError, Result};
pub use filter::{Filter, LevelSetFilter};
pub use formatter::{Formatter, MessageOnlyFormatter, TextFormatter};
pub use log_context::{FieldValue, LogContext};
pub use log_level::LogLevel;
pub use log_record::LogRecord;
pub use logger::{ExitFn, Logger, LoggerBuilder, TraceIdFn};
pub use metrics::EngineMetrics;
pub use pattern::{
    DateTimeFormat, PatternProgram, RenderOptions, DEFAULT_TIME_LAYOUT, PATTERN_DEFAULT,
    PATTERN_SIMPLE, PATTERN_TRACE,
};
