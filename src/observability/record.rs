//! Log record and severity definitions.
//!
//! # Design Decisions
//! - Four ordered severities; TRACE from `tracing` and `log` folds into DEBUG
//! - Records are plain data, cloned per handler so filters can annotate them

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use thiserror::Error;

/// Record severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Upper-case name as it appears in formatted lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a level name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" | "critical" => Ok(Level::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

impl From<Level> for log::LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Debug => log::LevelFilter::Debug,
            Level::Info => log::LevelFilter::Info,
            Level::Warn => log::LevelFilter::Warn,
            Level::Error => log::LevelFilter::Error,
        }
    }
}

/// A single emitted log record.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// When the record was emitted.
    pub timestamp: DateTime<Local>,
    /// Dot-separated logger name; empty for the root logger.
    pub name: String,
    /// Source line of the emitting call, when known.
    pub line: Option<u32>,
    /// Record severity.
    pub level: Level,
    /// Request identifier stamped by the context filter; empty when none.
    pub request: String,
    /// Rendered message text.
    pub message: String,
}

impl LogRecord {
    pub fn new(name: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            name: name.into(),
            line: None,
            level,
            request: String::new(),
            message: message.into(),
        }
    }

    pub fn with_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_level_parse_aliases() {
        assert_eq!("WARNING".parse::<Level>(), Ok(Level::Warn));
        assert_eq!("trace".parse::<Level>(), Ok(Level::Debug));
        assert_eq!(" Critical ".parse::<Level>(), Ok(Level::Error));
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn test_foreign_level_mapping() {
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Debug);
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(log::Level::Trace), Level::Debug);
        assert_eq!(Level::from(log::Level::Error), Level::Error);
    }
}
