//! # Rust Log Engine
//!
//! An embeddable asynchronous logging runtime. Applications emit leveled
//! records through a [`Logger`]; a dispatch engine fans them out to worker
//! threads that format and write them without blocking the caller.
//!
//! ## Features
//!
//! - **Pattern templates**: `%[LevelName]s %[DateTime]s %[Message]v`, compiled once
//! - **Rotating files**: by size, by time, or both, with backup retention
//! - **Backpressure policies**: drop newest, drop oldest, block, block with timeout
//! - **Fault isolation**: a failing or panicking sink never stops the others
//!
//! ## Example
//!
//! ```
//! use rust_log_engine::prelude::*;
//! use rust_log_engine::info;
//!
//! let logger = Logger::builder()
//!     .name("app")
//!     .worker(WorkerSpec::new(ConsoleSink::stderr()).threshold(LogLevel::Info))
//!     .build()
//!     .unwrap();
//!
//! info!(logger, "listening on {}", 8080);
//! logger.stop();
//! ```

pub mod config;
pub mod core;
pub mod global;
pub mod macros;
pub mod rotation;
pub mod sinks;

pub mod prelude {
    pub use crate::config::{
        FileSinkConfig, FormatterConfig, LoggerConfig, RotatorKind, SinkConfig, WorkerConfig,
    };
    pub use crate::core::{
        BackpressurePolicy, CallSite, CallerInfo, CallerResolver, DispatchEngine, EngineMetrics,
        ErrorCallback, FieldValue, Filter, Formatter, LogContext, LogLevel, LogRecord, Logger,
        LoggerBuilder, LoggerError, PatternProgram, Result, TextFormatter, WorkerSpec,
        DEFAULT_SHUTDOWN_TIMEOUT, PATTERN_DEFAULT, PATTERN_SIMPLE, PATTERN_TRACE,
    };
    pub use crate::rotation::{
        RolloverUnit, Rotator, SizeRotator, SuffixFormat, TimeAndSizeRotator, TimePolicy,
        TimeRotator,
    };
    pub use crate::sinks::{ConsoleSink, ConsoleTarget, FileSink, Sink};
}

pub use crate::core::{
    BackpressurePolicy, CallSite, CallerInfo, CallerResolver, DateTimeFormat, DispatchEngine,
    EngineMetrics, ErrorCallback, FieldValue, Filter, Formatter, LevelSetFilter, LocationResolver,
    LogContext, LogLevel, LogRecord, Logger, LoggerBuilder, LoggerError, MessageOnlyFormatter,
    PatternProgram, RenderOptions, Result, TextFormatter, WorkerSpec, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use sinks::{ConsoleSink, FileSink, Sink};
