//! Record filters

use super::log_level::LogLevel;
use super::log_record::LogRecord;

/// Decides whether a sink accepts a record. Rejection is silent.
pub trait Filter: Send + Sync {
    fn filter(&self, record: &LogRecord) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&LogRecord) -> bool + Send + Sync,
{
    fn filter(&self, record: &LogRecord) -> bool {
        self(record)
    }
}

/// Accepts only the listed levels
#[derive(Debug, Clone)]
pub struct LevelSetFilter {
    levels: Vec<LogLevel>,
}

impl LevelSetFilter {
    pub fn new(levels: impl IntoIterator<Item = LogLevel>) -> Self {
        Self {
            levels: levels.into_iter().collect(),
        }
    }
}

impl Filter for LevelSetFilter {
    fn filter(&self, record: &LogRecord) -> bool {
        self.levels.contains(&record.level)
    }
}
