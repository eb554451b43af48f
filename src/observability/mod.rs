//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Application code:  tracing::info!(target: "homeserver.storage", ...)
//! Runtime libraries: log::debug!(...)  → bridge.rs (LogTracer)
//!     → pipeline.rs PipelineLayer (event → LogRecord)
//!     → logger hierarchy (effective level, propagate)
//!     → handlers: filter.rs (request id from context.rs) → format.rs
//!     → sink.rs (rotating file / file / console)
//!
//! Startup (logging.rs):
//!     Settings → defaults or declarative config → Pipeline
//!     → global subscriber → bridge
//! ```
//!
//! # Design Decisions
//! - `tracing` macros are the emission API; the logger name is the target
//! - Request identifiers live in task-local storage, not on the call stack
//! - Emission never fails the caller; write errors are counted
//! - The pipeline is immutable after initialization

pub mod bridge;
pub mod context;
pub mod filter;
pub mod format;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use logging::{init, installed, levels_for, ACCESS_LOGGER, STORAGE_LOGGER};
pub use pipeline::{Handler, Logger, Pipeline, PipelineLayer};
pub use record::{Level, LogRecord};
