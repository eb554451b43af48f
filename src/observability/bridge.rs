//! Runtime diagnostic bridge.
//!
//! # Responsibilities
//! - Subscribe to the `log` facade, which the runtime's I/O stack (mio, hyper,
//!   and friends) reports through
//! - Re-emit every record as a `tracing` event so it reaches the same loggers,
//!   filters and sinks as application records
//!
//! # Design Decisions
//! - Stateless adapter; severities map through `Level::from(log::Level)`
//! - Original target and line survive via `tracing_log::NormalizeEvent`
//! - No buffering or backpressure: records are forwarded synchronously
//! - Not idempotent: the `log` facade accepts one logger per process

use tracing_log::LogTracer;

use super::record::Level;

/// Adapter from the `log` facade into the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeBridge;

impl RuntimeBridge {
    /// Register the bridge, forwarding records at `max_level` and above.
    ///
    /// Fails if a `log` logger is already installed.
    pub fn start(max_level: Level) -> Result<(), log::SetLoggerError> {
        LogTracer::builder()
            .with_max_level(log::LevelFilter::from(max_level))
            .init()
    }
}
