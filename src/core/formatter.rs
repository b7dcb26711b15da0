//! Record formatters

use super::error::{LoggerError, Result};
use super::log_record::LogRecord;
use super::pattern::{DateTimeFormat, PatternProgram, RenderOptions};
use std::io::Write;

/// Turns a record into bytes. The sink appends the line terminator.
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>>;
}

/// Pattern-driven text formatter
#[derive(Debug, Clone)]
pub struct TextFormatter {
    program: Option<PatternProgram>,
    options: RenderOptions,
}

impl TextFormatter {
    /// An empty template selects the fixed built-in layout
    pub fn new(template: &str) -> Self {
        let program = if template.is_empty() {
            None
        } else {
            Some(PatternProgram::compile(template))
        };
        Self {
            program,
            options: RenderOptions::default(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.options.colors = colors;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_quote(mut self, quote: bool, quote_empty: bool) -> Self {
        self.options.quote = quote;
        self.options.quote_empty = quote_empty;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_time_format(mut self, time_format: DateTimeFormat) -> Self {
        self.options.time_format = time_format;
        self
    }

    pub fn program(&self) -> Option<&PatternProgram> {
        self.program.as_ref()
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    // name (pid,tid) time.ms <trace> LEVEL caller message
    fn render_fixed(&self, record: &LogRecord, out: &mut Vec<u8>) {
        let _ = write!(
            out,
            "{} ({},{}) ",
            record.logger_name,
            std::process::id(),
            record.thread_id
        );
        self.options.time_format.write(&record.timestamp, out);
        let _ = write!(
            out,
            " <{}> {} ",
            record.trace_id.as_deref().unwrap_or(""),
            record.level.short_str()
        );
        if let Some(caller) = &record.caller {
            let _ = write!(out, "{} ", caller.full());
        }
        out.extend_from_slice(record.message.as_bytes());
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new(super::pattern::PATTERN_DEFAULT)
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(64 + record.message.len());
        match &self.program {
            Some(program) => program.execute(record, &self.options, &mut out),
            None => self.render_fixed(record, &mut out),
        }
        if let Some(extras) = &record.extras {
            let _ = write!(out, " {}", extras);
        }
        Ok(out)
    }
}

/// Emits only the message text; rejects records without one
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageOnlyFormatter;

impl Formatter for MessageOnlyFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>> {
        if record.message.is_empty() {
            return Err(LoggerError::formatter("MessageOnly", "message is empty"));
        }
        Ok(record.message.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_context::LogContext;
    use crate::core::log_level::LogLevel;

    #[test]
    fn test_pattern_formatter() {
        let formatter = TextFormatter::new("%[LevelName]s|%[Message]v");
        let record = LogRecord::new("app", LogLevel::Error, "failed");
        assert_eq!(formatter.format(&record).unwrap(), b"ERR |failed");
    }

    #[test]
    fn test_extras_appended() {
        let formatter = TextFormatter::new("%[Message]v");
        let record = LogRecord::new("app", LogLevel::Info, "login")
            .with_extras(LogContext::new().with_field("user", "bob"));
        assert_eq!(formatter.format(&record).unwrap(), b"login user=bob");
    }

    #[test]
    fn test_empty_template_uses_fixed_layout() {
        let formatter = TextFormatter::new("");
        assert!(formatter.program().is_none());
        let record = LogRecord::new("app", LogLevel::Info, "hello").with_trace_id("t9");
        let line = String::from_utf8(formatter.format(&record).unwrap()).unwrap();
        assert!(line.starts_with(&format!("app ({},", std::process::id())));
        assert!(line.contains(" <t9> INF "));
        assert!(line.ends_with("hello"));
    }

    #[test]
    fn test_message_only_rejects_empty() {
        let record = LogRecord::new("app", LogLevel::Info, "");
        let err = MessageOnlyFormatter.format(&record).unwrap_err();
        assert!(matches!(err, LoggerError::FormatterError { .. }));
    }
}
