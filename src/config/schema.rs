//! Declarative logging configuration schema.
//!
//! This module defines the structure of an external logging config file.
//! All types derive Serde traits for deserialization from TOML or JSON.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::observability::format::ACCESS_FORMAT;
use crate::observability::logging::{LOG_BACKUP_COUNT, MAX_LOG_BYTES};

/// Root of a declarative logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Named line formats.
    pub formatters: BTreeMap<String, FormatterConfig>,

    /// Named record filters.
    pub filters: BTreeMap<String, FilterConfig>,

    /// Named handlers (sink + formatter + filters).
    pub handlers: BTreeMap<String, HandlerConfig>,

    /// Loggers by dotted name.
    pub loggers: BTreeMap<String, LoggerConfig>,

    /// The root logger.
    pub root: LoggerConfig,
}

/// A named line format.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FormatterConfig {
    /// Template with `{timestamp}`, `{name}`, `{line}`, `{level}`, `{request}`
    /// and `{message}` placeholders.
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    ACCESS_FORMAT.to_string()
}

/// A named record filter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    /// Stamps records with the current request identifier.
    RequestContext {
        /// Value used when no request is active.
        #[serde(default)]
        default: String,
    },
}

/// A named handler.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HandlerConfig {
    /// Where lines go.
    #[serde(flatten)]
    pub sink: SinkConfig,

    /// Formatter name; message-only when absent.
    #[serde(default)]
    pub formatter: Option<String>,

    /// Filter names, applied in order.
    #[serde(default)]
    pub filters: Vec<String>,

    /// Optional handler threshold.
    #[serde(default)]
    pub level: Option<String>,
}

/// Sink kinds a handler can write to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Size-bounded file with numbered backups.
    RotatingFile {
        path: PathBuf,
        #[serde(default = "default_max_bytes")]
        max_bytes: u64,
        #[serde(default = "default_backup_count")]
        backup_count: u32,
    },

    /// Append-only file.
    File { path: PathBuf },

    /// Standard output or standard error.
    Console {
        #[serde(default)]
        stream: ConsoleStream,
    },
}

fn default_max_bytes() -> u64 {
    MAX_LOG_BYTES
}

fn default_backup_count() -> u32 {
    LOG_BACKUP_COUNT
}

/// Console stream selector.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    Stdout,
    #[default]
    Stderr,
}

/// A logger entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    /// Threshold; inherited from the nearest ancestor when absent.
    pub level: Option<String>,

    /// Handler names.
    pub handlers: Vec<String>,

    /// Whether records continue to ancestor handlers.
    pub propagate: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: None,
            handlers: Vec::new(),
            propagate: true,
        }
    }
}
