//! Output destinations for formatted records

pub mod console;
pub mod file;

pub use console::{ConsoleSink, ConsoleTarget};
pub use file::{FileSink, FileSinkBuilder};

use crate::core::{error::Result, log_record::LogRecord};

/// A sink is owned by exactly one worker thread of the dispatch engine.
pub trait Sink: Send {
    /// Filter, format and hand off one record
    fn emit(&mut self, record: &LogRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Drain and release resources. Records emitted afterwards are rejected.
    fn close(&mut self) -> Result<()>;

    fn name(&self) -> &str;
}

impl Sink for Box<dyn Sink> {
    fn emit(&mut self, record: &LogRecord) -> Result<()> {
        (**self).emit(record)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
