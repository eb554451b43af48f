//! Logger hierarchy and record dispatch.
//!
//! # Responsibilities
//! - Hold the wired loggers, handlers, filters and sinks
//! - Resolve a record's effective threshold from the logger hierarchy
//! - Dispatch accepted records to handlers, honouring `propagate`
//! - Adapt `tracing` events into records (`PipelineLayer`)
//!
//! # Design Decisions
//! - Logger names are dot-separated; `tracing` targets have `::` mapped to `.`
//! - The root logger is named `""`
//! - A logger without a level inherits the nearest configured ancestor's
//! - Handler filters run on a per-handler copy of the record
//! - Sink failures are counted, never returned to the emitting call

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_log::NormalizeEvent;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use super::filter::RecordFilter;
use super::format::LineFormat;
use super::metrics;
use super::record::{Level, LogRecord};
use super::sink::Sink;

/// Name of the root logger.
pub const ROOT: &str = "";

/// Threshold of a root logger that was not given one.
pub const DEFAULT_ROOT_LEVEL: Level = Level::Warn;

/// Map a `tracing` target such as `homeserver::storage` to a logger name.
pub fn logger_name(target: &str) -> String {
    target.replace("::", ".")
}

/// `name` followed by each of its ancestors, ending with the root logger.
fn lineage(name: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(name);
    std::iter::from_fn(move || {
        let current = next?;
        next = if current.is_empty() {
            None
        } else {
            Some(current.rfind('.').map_or(ROOT, |i| &current[..i]))
        };
        Some(current)
    })
}

/// A formatter, filters and sink, with an optional threshold.
pub struct Handler {
    name: String,
    sink: Arc<dyn Sink>,
    format: LineFormat,
    level: Option<Level>,
    filters: Vec<Arc<dyn RecordFilter>>,
    failures: AtomicU64,
}

impl Handler {
    pub fn new(name: impl Into<String>, sink: Arc<dyn Sink>, format: LineFormat) -> Self {
        Self {
            name: name.into(),
            sink,
            format,
            level: None,
            filters: Vec::new(),
            failures: AtomicU64::new(0),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn RecordFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Option<Level> {
        self.level
    }

    /// Number of lines the sink failed to write.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn flush(&self) -> std::io::Result<()> {
        self.sink.flush()
    }

    fn handle(&self, record: &LogRecord) {
        if self.level.is_some_and(|level| record.level < level) {
            return;
        }

        let mut record = record.clone();
        for filter in &self.filters {
            if !filter.filter(&mut record) {
                return;
            }
        }

        let line = self.format.format(&record);
        if self.sink.write_line(&line).is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
            metrics::record_write_failure(&self.name);
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("sink", &self.sink)
            .field("level", &self.level)
            .field("filters", &self.filters)
            .finish()
    }
}

/// A named node of the logger hierarchy.
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    level: Option<Level>,
    handlers: Vec<Arc<Handler>>,
    propagate: bool,
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: None,
            handlers: Vec::new(),
            propagate: true,
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT)
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_handler(mut self, handler: Arc<Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_propagate(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Option<Level> {
        self.level
    }

    pub fn handlers(&self) -> &[Arc<Handler>] {
        &self.handlers
    }

    pub fn propagate(&self) -> bool {
        self.propagate
    }
}

/// The wired logging pipeline: loggers → handlers → sinks.
#[derive(Debug)]
pub struct Pipeline {
    loggers: HashMap<String, Logger>,
}

impl Pipeline {
    /// Create a pipeline around `root`, whose name is forced to [`ROOT`].
    pub fn new(mut root: Logger) -> Self {
        root.name = ROOT.to_string();
        if root.level.is_none() {
            root.level = Some(DEFAULT_ROOT_LEVEL);
        }
        let mut loggers = HashMap::new();
        loggers.insert(ROOT.to_string(), root);
        Self { loggers }
    }

    /// Add or replace a non-root logger.
    pub fn add_logger(&mut self, logger: Logger) {
        if logger.name.is_empty() {
            return;
        }
        self.loggers.insert(logger.name.clone(), logger);
    }

    pub fn logger(&self, name: &str) -> Option<&Logger> {
        self.loggers.get(name)
    }

    pub fn root(&self) -> Option<&Logger> {
        self.loggers.get(ROOT)
    }

    /// Threshold applied to records from logger `name`.
    pub fn effective_level(&self, name: &str) -> Level {
        lineage(name)
            .find_map(|n| self.loggers.get(n).and_then(|logger| logger.level))
            .unwrap_or(DEFAULT_ROOT_LEVEL)
    }

    /// Whether a record at `level` from logger `name` passes the logger thresholds.
    pub fn accepts(&self, name: &str, level: Level) -> bool {
        level >= self.effective_level(name)
    }

    /// Most verbose threshold configured anywhere in the pipeline.
    pub fn max_level(&self) -> Level {
        self.loggers
            .values()
            .filter_map(|logger| logger.level)
            .min()
            .unwrap_or(DEFAULT_ROOT_LEVEL)
    }

    /// Route `record` to the handlers of its logger and, while `propagate`
    /// holds, those of its ancestors.
    pub fn dispatch(&self, record: &LogRecord) {
        if !self.accepts(&record.name, record.level) {
            return;
        }
        for name in lineage(&record.name) {
            let Some(logger) = self.loggers.get(name) else {
                continue;
            };
            for handler in &logger.handlers {
                handler.handle(record);
            }
            if !logger.propagate {
                break;
            }
        }
    }

    /// Every distinct handler attached to some logger.
    pub fn handlers(&self) -> Vec<Arc<Handler>> {
        let mut handlers: Vec<Arc<Handler>> = Vec::new();
        for logger in self.loggers.values() {
            for handler in &logger.handlers {
                if !handlers.iter().any(|h| Arc::ptr_eq(h, handler)) {
                    handlers.push(handler.clone());
                }
            }
        }
        handlers
    }

    /// Total failed writes across all handlers.
    pub fn write_failures(&self) -> u64 {
        self.handlers().iter().map(|h| h.failures()).sum()
    }

    /// Flush every sink, returning the first error.
    pub fn flush(&self) -> std::io::Result<()> {
        for handler in self.handlers() {
            handler.flush()?;
        }
        Ok(())
    }

    /// A `tracing` layer feeding events into this pipeline.
    pub fn layer(self: &Arc<Self>) -> PipelineLayer {
        PipelineLayer {
            pipeline: self.clone(),
        }
    }
}

/// Collects the message and extra fields of an event.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl MessageVisitor {
    fn push(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            self.message = value;
        } else if !name.starts_with("log.") {
            // `log.*` fields carry metadata of bridged `log` records.
            self.fields.push((name.to_string(), value));
        }
    }

    fn finish(self) -> String {
        let mut message = self.message;
        for (name, value) in self.fields {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(&name);
            message.push('=');
            message.push_str(&value);
        }
        message
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }
}

/// `tracing` layer that turns events into records and dispatches them.
#[derive(Debug, Clone)]
pub struct PipelineLayer {
    pipeline: Arc<Pipeline>,
}

impl<S: Subscriber> Layer<S> for PipelineLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // Bridged `log` records carry their real target and line as fields.
        let normalized = event.normalized_metadata();
        let metadata = normalized.as_ref().unwrap_or_else(|| event.metadata());

        let name = logger_name(metadata.target());
        let level = Level::from(*metadata.level());
        if !self.pipeline.accepts(&name, level) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord::new(name, level, visitor.finish()).with_line(metadata.line());
        self.pipeline.dispatch(&record);
    }
}
