//! Console sink

use super::Sink;
use crate::core::error::Result;
use crate::core::filter::Filter;
use crate::core::formatter::{Formatter, TextFormatter};
use crate::core::log_record::LogRecord;
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

/// Writes one formatted line per record to stdout or stderr
pub struct ConsoleSink {
    target: ConsoleTarget,
    formatter: Box<dyn Formatter>,
    filter: Option<Box<dyn Filter>>,
    closed: bool,
}

impl ConsoleSink {
    pub fn new(target: ConsoleTarget) -> Self {
        Self {
            target,
            formatter: Box::new(TextFormatter::default().with_colors(true)),
            filter: None,
            closed: false,
        }
    }

    pub fn stdout() -> Self {
        Self::new(ConsoleTarget::Stdout)
    }

    pub fn stderr() -> Self {
        Self::new(ConsoleTarget::Stderr)
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_boxed_formatter(mut self, formatter: Box<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_boxed_filter(mut self, filter: Option<Box<dyn Filter>>) -> Self {
        self.filter = filter;
        self
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }

    fn write_line(&self, mut line: Vec<u8>) -> std::io::Result<()> {
        line.push(b'\n');
        match self.target {
            ConsoleTarget::Stdout => std::io::stdout().lock().write_all(&line),
            ConsoleTarget::Stderr => std::io::stderr().lock().write_all(&line),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::stdout()
    }
}

impl Sink for ConsoleSink {
    fn emit(&mut self, record: &LogRecord) -> Result<()> {
        if self.closed {
            return Err(crate::core::error::LoggerError::LoggerStopped);
        }
        if let Some(filter) = &self.filter {
            if !filter.filter(record) {
                return Ok(());
            }
        }
        let line = self.formatter.format(record)?;
        self.write_line(line)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self.target {
            ConsoleTarget::Stdout => std::io::stdout().flush()?,
            ConsoleTarget::Stderr => std::io::stderr().flush()?,
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.flush()
    }

    fn name(&self) -> &str {
        match self.target {
            ConsoleTarget::Stdout => "stdout",
            ConsoleTarget::Stderr => "stderr",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LoggerError;
    use crate::core::log_level::LogLevel;

    #[test]
    fn test_emit_and_close() {
        let mut sink = ConsoleSink::stderr().with_formatter(TextFormatter::new("%[Message]v"));
        assert_eq!(sink.name(), "stderr");
        sink.emit(&LogRecord::new("t", LogLevel::Info, "console sink test"))
            .unwrap();
        sink.close().unwrap();
        assert!(matches!(
            sink.emit(&LogRecord::new("t", LogLevel::Info, "late")),
            Err(LoggerError::LoggerStopped)
        ));
        // second close is a no-op
        sink.close().unwrap();
    }

    #[test]
    fn test_filter_rejects_silently() {
        let mut sink = ConsoleSink::stdout().with_filter(|r: &LogRecord| r.level >= LogLevel::Error);
        assert!(sink.emit(&LogRecord::new("t", LogLevel::Info, "hidden")).is_ok());
    }
}
