//! Configuration schema
//!
//! One serde schema covers the whole runtime. Every field has a default, so a
//! JSON document only needs the values it changes.
//!
//! # Example
//!
//! ```
//! use rust_log_engine::config::{LoggerConfig, SinkConfig};
//!
//! let config = LoggerConfig::from_json(r#"{
//!     "name": "api",
//!     "level": "info",
//!     "workers": [
//!         { "level": "debug", "sink": { "type": "stderr" } }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(config.name, "api");
//! assert!(matches!(config.workers[0].sink, SinkConfig::Stderr));
//! ```

use crate::core::backpressure::BackpressurePolicy;
use crate::core::error::{default_error_callback, ErrorCallback, LoggerError, Result};
use crate::core::filter::{Filter, LevelSetFilter};
use crate::core::formatter::{Formatter, TextFormatter};
use crate::core::log_level::LogLevel;
use crate::core::pattern::{DateTimeFormat, DEFAULT_TIME_LAYOUT, PATTERN_DEFAULT};
use crate::rotation::{RolloverUnit, SuffixFormat};
use crate::sinks::{ConsoleSink, ConsoleTarget, FileSink, Sink};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CACHE_SIZE: usize = 1024;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;
pub const DEFAULT_BACKUP_COUNT: usize = 7;

/// Which rotator a file sink uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotatorKind {
    Size,
    Time,
    #[default]
    TimeAndSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    pub dir: PathBuf,
    pub name: String,
    pub suffix: String,
    pub max_size: u64,
    /// Size rotator: numbered backups (at least 1). Time rotators: backups
    /// kept by pruning, 0 keeps everything.
    pub backup_count: usize,
    pub rotator: RotatorKind,
    pub when: RolloverUnit,
    pub interval_step: u32,
    pub bulk_write_size: usize,
    pub concurrent_write: bool,
    pub suffix_format: SuffixFormat,
    pub queue_size: usize,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            name: "app".to_string(),
            suffix: "log".to_string(),
            max_size: DEFAULT_MAX_FILE_SIZE,
            backup_count: DEFAULT_BACKUP_COUNT,
            rotator: RotatorKind::default(),
            when: RolloverUnit::default(),
            interval_step: 1,
            bulk_write_size: crate::sinks::file::DEFAULT_BULK_WRITE_SIZE,
            concurrent_write: false,
            suffix_format: SuffixFormat::default(),
            queue_size: crate::sinks::file::DEFAULT_QUEUE_SIZE,
        }
    }
}

impl FileSinkConfig {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// `dir/name.suffix`, or `dir/name` with an empty suffix
    pub fn live_path(&self) -> PathBuf {
        if self.suffix.is_empty() {
            self.dir.join(&self.name)
        } else {
            self.dir.join(format!("{}.{}", self.name, self.suffix))
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(LoggerError::config("FileSinkConfig", "name must not be empty"));
        }
        if self.queue_size == 0 {
            return Err(LoggerError::config("FileSinkConfig", "queue_size must be positive"));
        }
        if self.bulk_write_size == 0 {
            return Err(LoggerError::config(
                "FileSinkConfig",
                "bulk_write_size must be positive",
            ));
        }
        if self.interval_step == 0 {
            return Err(LoggerError::config(
                "FileSinkConfig",
                "interval_step must be at least 1",
            ));
        }
        if self.rotator == RotatorKind::Size {
            if self.backup_count == 0 {
                return Err(LoggerError::config(
                    "FileSinkConfig",
                    "backup_count must be at least 1 for size rotation",
                ));
            }
            if self.max_size == 0 {
                return Err(LoggerError::config(
                    "FileSinkConfig",
                    "max_size must be positive for size rotation",
                ));
            }
        }
        self.suffix_format.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Pattern template; empty selects the fixed layout
    pub pattern: String,
    pub time_layout: String,
    pub colors: bool,
    pub quote: bool,
    pub quote_empty: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            pattern: PATTERN_DEFAULT.to_string(),
            time_layout: DEFAULT_TIME_LAYOUT.to_string(),
            colors: false,
            quote: false,
            quote_empty: false,
        }
    }
}

impl FormatterConfig {
    pub fn build(&self) -> Result<TextFormatter> {
        Ok(TextFormatter::new(&self.pattern)
            .with_colors(self.colors)
            .with_quote(self.quote, self.quote_empty)
            .with_time_format(DateTimeFormat::new(self.time_layout.clone())?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    #[default]
    Stdout,
    Stderr,
    File(FileSinkConfig),
}

impl SinkConfig {
    pub fn build(
        &self,
        formatter: Box<dyn Formatter>,
        filter: Option<Box<dyn Filter>>,
        on_error: ErrorCallback,
    ) -> Result<Box<dyn Sink>> {
        let target = match self {
            SinkConfig::Stdout => ConsoleTarget::Stdout,
            SinkConfig::Stderr => ConsoleTarget::Stderr,
            SinkConfig::File(file) => {
                return Ok(Box::new(FileSink::from_config(file, formatter, filter, on_error)?));
            }
        };
        Ok(Box::new(
            ConsoleSink::new(target)
                .with_boxed_formatter(formatter)
                .with_boxed_filter(filter),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub cache_size: usize,
    pub level: LogLevel,
    pub backpressure: BackpressurePolicy,
    /// When set, only these levels reach the sink
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<LogLevel>>,
    pub sink: SinkConfig,
    pub formatter: FormatterConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            level: LogLevel::Print,
            backpressure: BackpressurePolicy::default(),
            levels: None,
            sink: SinkConfig::default(),
            formatter: FormatterConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn new(sink: SinkConfig) -> Self {
        Self {
            sink,
            ..Self::default()
        }
    }

    pub fn filter(&self) -> Option<Box<dyn Filter>> {
        self.levels
            .as_ref()
            .map(|levels| Box::new(LevelSetFilter::new(levels.iter().copied())) as Box<dyn Filter>)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_size == 0 {
            return Err(LoggerError::config("WorkerConfig", "cache_size must be positive"));
        }
        if matches!(&self.levels, Some(levels) if levels.is_empty()) {
            return Err(LoggerError::config("WorkerConfig", "levels must not be empty"));
        }
        DateTimeFormat::new(self.formatter.time_layout.clone())
            .map_err(|e| LoggerError::config("FormatterConfig", e.to_string()))?;
        match &self.sink {
            SinkConfig::File(file) => file.validate(),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub name: String,
    pub level: LogLevel,
    pub throw_on_level: LogLevel,
    pub record_caller: bool,
    /// Empty means a single stdout worker
    pub workers: Vec<WorkerConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            level: LogLevel::Print,
            throw_on_level: LogLevel::None,
            record_caller: true,
            workers: Vec::new(),
        }
    }
}

impl LoggerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.workers.iter().try_for_each(WorkerConfig::validate)
    }

    /// Workers after defaulting
    pub fn effective_workers(&self) -> Vec<WorkerConfig> {
        if self.workers.is_empty() {
            vec![WorkerConfig {
                formatter: FormatterConfig {
                    colors: true,
                    ..FormatterConfig::default()
                },
                ..WorkerConfig::default()
            }]
        } else {
            self.workers.clone()
        }
    }

    /// Build the logger described by this configuration
    pub fn build(&self) -> Result<crate::core::logger::Logger> {
        self.build_with_error_callback(default_error_callback())
    }

    pub fn build_with_error_callback(&self, on_error: ErrorCallback) -> Result<crate::core::logger::Logger> {
        crate::core::logger::Logger::builder()
            .config(self.clone())
            .on_error(on_error)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_record::LogRecord;

    #[test]
    fn test_defaults() {
        let file = FileSinkConfig::default();
        assert_eq!(file.suffix, "log");
        assert_eq!(file.max_size, 1 << 30);
        assert_eq!(file.bulk_write_size, 10 * 1024 * 1024);
        assert_eq!(file.rotator, RotatorKind::TimeAndSize);
        assert_eq!(file.when, RolloverUnit::Hour);
        assert_eq!(file.interval_step, 1);

        let config = LoggerConfig::default();
        assert_eq!(config.level, LogLevel::Print);
        assert_eq!(config.throw_on_level, LogLevel::None);
        assert!(config.record_caller);
        let workers = config.effective_workers();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].sink, SinkConfig::Stdout);
        assert_eq!(workers[0].cache_size, DEFAULT_CACHE_SIZE);
    }

    #[test]
    fn test_live_path() {
        let config = FileSinkConfig::new("/var/log/svc", "api");
        assert_eq!(config.live_path(), PathBuf::from("/var/log/svc/api.log"));
        let bare = FileSinkConfig {
            suffix: String::new(),
            ..config
        };
        assert_eq!(bare.live_path(), PathBuf::from("/var/log/svc/api"));
    }

    #[test]
    fn test_size_rotation_needs_backups() {
        let config = FileSinkConfig {
            rotator: RotatorKind::Size,
            backup_count: 0,
            ..FileSinkConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoggerError::InvalidConfiguration { .. })
        ));

        // time rotators treat 0 as keep-all
        let config = FileSinkConfig {
            rotator: RotatorKind::Time,
            backup_count: 0,
            ..FileSinkConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_cache_rejected() {
        let config = LoggerConfig {
            workers: vec![WorkerConfig {
                cache_size: 0,
                ..WorkerConfig::default()
            }],
            ..LoggerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_file_worker() {
        let config = LoggerConfig::from_json(
            r#"{
                "name": "svc",
                "throw_on_level": "fatal",
                "workers": [{
                    "cache_size": 8,
                    "level": "info",
                    "backpressure": "drop_oldest",
                    "sink": {
                        "type": "file",
                        "dir": "/tmp/logs",
                        "name": "svc",
                        "rotator": "size",
                        "max_size": 4096,
                        "backup_count": 3
                    },
                    "formatter": { "pattern": "%[Message]v" }
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.throw_on_level, LogLevel::Fatal);
        let worker = &config.workers[0];
        assert_eq!(worker.cache_size, 8);
        assert_eq!(worker.backpressure, BackpressurePolicy::DropOldest);
        assert_eq!(worker.formatter.pattern, "%[Message]v");
        assert_eq!(worker.formatter.time_layout, DEFAULT_TIME_LAYOUT);
        match &worker.sink {
            SinkConfig::File(file) => {
                assert_eq!(file.rotator, RotatorKind::Size);
                assert_eq!(file.max_size, 4096);
                assert_eq!(file.suffix, "log");
            }
            other => panic!("unexpected sink {:?}", other),
        }
    }

    #[test]
    fn test_level_set_from_json() {
        let config = LoggerConfig::from_json(
            r#"{"workers":[{"sink":{"type":"stderr"},"levels":["warn","fatal"]}]}"#,
        )
        .unwrap();
        let filter = config.workers[0].filter().unwrap();
        assert!(filter.filter(&LogRecord::new("a", LogLevel::Warn, "x")));
        assert!(!filter.filter(&LogRecord::new("a", LogLevel::Error, "x")));
        assert!(WorkerConfig::default().filter().is_none());

        assert!(matches!(
            LoggerConfig::from_json(r#"{"workers":[{"levels":[]}]}"#),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_json_errors() {
        assert!(matches!(
            LoggerConfig::from_json("{ not json"),
            Err(LoggerError::JsonError(_))
        ));
        assert!(matches!(
            LoggerConfig::from_json(r#"{"workers":[{"formatter":{"time_layout":"%Q"}}]}"#),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = LoggerConfig {
            name: "svc".to_string(),
            workers: vec![WorkerConfig::new(SinkConfig::File(FileSinkConfig::new("logs", "svc")))],
            ..LoggerConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(LoggerConfig::from_json(&json).unwrap(), config);
    }
}
