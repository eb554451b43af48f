//! Errors surfaced by logging initialization.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Startup failures of the logging subsystem.
///
/// Emission-time failures never produce this type; they are counted on the
/// handler that hit them.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The declarative config is missing, unreadable, malformed or inconsistent.
    #[error("invalid logging configuration: {0}")]
    Config(#[from] ConfigError),

    /// A sink target could not be opened or created.
    #[error("cannot open log file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `init` was called after a successful `init`.
    #[error("logging is already initialized")]
    AlreadyInitialized,

    /// Another global `tracing` subscriber is installed.
    #[error("cannot install the logging subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Another `log` logger is installed.
    #[error("cannot start the runtime diagnostic bridge: {0}")]
    Bridge(#[from] log::SetLoggerError),
}
