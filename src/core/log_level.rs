//! Log level definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Totally ordered severity.
///
/// `None` sorts above every real level; used as a threshold it never triggers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 1,
    #[default]
    Print = 2,
    Info = 3,
    Warn = 4,
    Error = 5,
    Panic = 6,
    Fatal = 7,
    None = 8,
}

impl LogLevel {
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Debug,
        LogLevel::Print,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Panic,
        LogLevel::Fatal,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Print => "PRINT",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Panic => "PANIC",
            LogLevel::Fatal => "FATAL",
            LogLevel::None => "NONE",
        }
    }

    /// Fixed-width name used by the text layouts
    pub fn short_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DBG ",
            LogLevel::Print => "PRT ",
            LogLevel::Info => "INF ",
            LogLevel::Warn => "WAR ",
            LogLevel::Error => "ERR ",
            LogLevel::Panic => "PAN ",
            LogLevel::Fatal => "FAT ",
            LogLevel::None => "NON ",
        }
    }

    #[inline]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(LogLevel::Debug),
            2 => Some(LogLevel::Print),
            3 => Some(LogLevel::Info),
            4 => Some(LogLevel::Warn),
            5 => Some(LogLevel::Error),
            6 => Some(LogLevel::Panic),
            7 => Some(LogLevel::Fatal),
            8 => Some(LogLevel::None),
            _ => None,
        }
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::Debug => Blue,
            LogLevel::Print => Cyan,
            LogLevel::Info => Green,
            LogLevel::Warn => Yellow,
            _ => Red,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "PRINT" => Ok(LogLevel::Print),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "PANIC" => Ok(LogLevel::Panic),
            "FATAL" => Ok(LogLevel::Fatal),
            "NONE" => Ok(LogLevel::None),
            _ => Err(format!("Invalid log level: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Print);
        assert!(LogLevel::Print < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Panic);
        assert!(LogLevel::Panic < LogLevel::Fatal);
        assert!(LogLevel::Fatal < LogLevel::None);
    }

    #[test]
    fn test_none_never_triggers() {
        for level in LogLevel::ALL {
            assert!(level < LogLevel::None);
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("Print".parse::<LogLevel>(), Ok(LogLevel::Print));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_u8_roundtrip_covers_none() {
        assert_eq!(LogLevel::from_u8(LogLevel::None.as_u8()), Some(LogLevel::None));
        assert_eq!(LogLevel::from_u8(0), None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&LogLevel::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
        let level: LogLevel = serde_json::from_str("\"fatal\"").unwrap();
        assert_eq!(level, LogLevel::Fatal);
    }
}
