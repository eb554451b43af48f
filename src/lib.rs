//! Homeserver logging subsystem.
//!
//! Builds the process-wide log pipeline from command-line settings or a
//! declarative config file, and stamps every record with the identifier of
//! the request being served.

pub mod config;
pub mod error;
pub mod http;
pub mod observability;

pub use config::{LoggingArgs, Settings};
pub use error::LoggingError;
pub use http::HttpServer;
pub use observability::{init, Pipeline};
