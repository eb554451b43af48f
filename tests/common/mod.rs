//! Shared utilities for integration tests.
//!
//! Every test binary is its own process, so each may install the global
//! pipeline once.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use homeserver_logging::Settings;

/// Default-mode settings writing both logs under `dir`.
pub fn file_settings(dir: &Path) -> Settings {
    Settings {
        verbosity: None,
        log_file: Some(dir.join("homeserver.log")),
        access_log_file: Some(dir.join("access.log")),
        log_config: None,
    }
}

/// Lines of `path`, empty when the file does not exist.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_owned).collect())
        .unwrap_or_default()
}

/// A line in the main format, split into its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainLine {
    pub timestamp: String,
    pub name: String,
    pub line: String,
    pub level: String,
    pub request: String,
    pub message: String,
}

/// Split a main-format line; the message may itself contain ` - `.
pub fn parse_main_line(line: &str) -> MainLine {
    let parts: Vec<&str> = line.splitn(6, " - ").collect();
    assert_eq!(parts.len(), 6, "not a main-format line: {line:?}");
    MainLine {
        timestamp: parts[0].to_string(),
        name: parts[1].to_string(),
        line: parts[2].to_string(),
        level: parts[3].to_string(),
        request: parts[4].to_string(),
        message: parts[5].to_string(),
    }
}

/// Main-format lines of `path`.
pub fn main_lines(path: &Path) -> Vec<MainLine> {
    read_lines(path).iter().map(|l| parse_main_line(l)).collect()
}

/// Write `content` to `name` under `dir` and return its path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Whether `timestamp` looks like `2024-01-31 12:34:56,789`.
pub fn is_timestamp(timestamp: &str) -> bool {
    chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S,%3f").is_ok()
}
