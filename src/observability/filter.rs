//! Record filters attached to handlers.

use std::fmt;

use super::context;
use super::record::LogRecord;

/// A per-handler filter. Runs synchronously on the emitting task.
pub trait RecordFilter: Send + Sync + fmt::Debug {
    /// Returns false to drop the record. Filters may annotate the record in place.
    fn filter(&self, record: &mut LogRecord) -> bool;
}

/// Stamps each record with the innermost active request identifier.
///
/// When no request is active the record gets `default`, which is the empty
/// string unless configured otherwise.
#[derive(Debug, Clone, Default)]
pub struct RequestContextFilter {
    default: String,
}

impl RequestContextFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
        }
    }
}

impl RecordFilter for RequestContextFilter {
    fn filter(&self, record: &mut LogRecord) -> bool {
        let current = context::current();
        record.request = if current.is_empty() {
            self.default.clone()
        } else {
            current
        };
        true
    }
}
