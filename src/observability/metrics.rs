//! Metrics emitted by the logging pipeline.
//!
//! # Metrics
//! - `log_write_failures_total` (counter): sink writes that failed, by handler
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder the calls are no-ops

/// Record a failed sink write for `handler`.
pub fn record_write_failure(handler: &str) {
    ::metrics::counter!("log_write_failures_total", "handler" => handler.to_string()).increment(1);
}
