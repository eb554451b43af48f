//! Logging initialization.
//!
//! # Responsibilities
//! - Build the pipeline from built-in defaults or a declarative config
//! - Install it as the process-wide `tracing` subscriber, exactly once
//! - Start the runtime diagnostic bridge
//!
//! # Design Decisions
//! - Construction is separate from installation so a pipeline can be built
//!   and exercised without touching global state
//! - Every startup failure is returned to the caller; nothing is logged
//!   before the pipeline is installed
//! - A failed `init` does not consume the once-only slot, even when the
//!   subscriber or bridge could not be installed

use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing_subscriber::layer::SubscriberExt;

use crate::config::schema::{ConsoleStream, FilterConfig, LoggingConfig, SinkConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::config::{load_config, ConfigError, Settings};
use crate::error::LoggingError;

use super::bridge::RuntimeBridge;
use super::filter::{RecordFilter, RequestContextFilter};
use super::format::LineFormat;
use super::pipeline::{Handler, Logger, Pipeline};
use super::record::Level;
use super::sink::{ConsoleSink, FileSink, RotatingFileSink, Sink, Stream};

/// Maximum size of a default-mode log file before it rotates.
pub const MAX_LOG_BYTES: u64 = 100_000_000;

/// Rotated files kept by default-mode sinks.
pub const LOG_BACKUP_COUNT: u32 = 3;

/// Logger that receives one pre-formatted line per served request.
pub const ACCESS_LOGGER: &str = "homeserver.access";

/// Logger of the storage layer, which needs more verbosity to reach DEBUG.
pub const STORAGE_LOGGER: &str = "homeserver.storage";

static PIPELINE: OnceLock<Arc<Pipeline>> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Default-mode thresholds for `verbosity`: `(base, storage)`.
pub fn levels_for(verbosity: Option<u8>) -> (Level, Level) {
    match verbosity.unwrap_or(0) {
        0 => (Level::Info, Level::Info),
        1 => (Level::Debug, Level::Info),
        _ => (Level::Debug, Level::Debug),
    }
}

/// Build the pipeline, install it globally and start the bridge.
///
/// Callable once per process; later calls fail with
/// [`LoggingError::AlreadyInitialized`] and leave the installed pipeline alone.
pub fn init(settings: &Settings) -> Result<Arc<Pipeline>, LoggingError> {
    // Serializes racing callers; the slot is filled only once everything is wired.
    let _init = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if PIPELINE.get().is_some() {
        return Err(LoggingError::AlreadyInitialized);
    }

    let pipeline = Arc::new(Pipeline::from_settings(settings)?);
    let subscriber = tracing_subscriber::registry().with(pipeline.layer());
    tracing::subscriber::set_global_default(subscriber)?;
    RuntimeBridge::start(pipeline.max_level())?;

    PIPELINE
        .set(pipeline.clone())
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    tracing::debug!(
        declarative = settings.log_config.is_some(),
        max_level = %pipeline.max_level(),
        "Logging initialized"
    );
    Ok(pipeline)
}

/// The installed pipeline, if [`init`] has succeeded.
pub fn installed() -> Option<Arc<Pipeline>> {
    PIPELINE.get().cloned()
}

fn open_rotating(path: &Path, max_bytes: u64, backup_count: u32) -> Result<Arc<dyn Sink>, LoggingError> {
    let sink = RotatingFileSink::open(path, max_bytes, backup_count).map_err(|source| LoggingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Arc::new(sink))
}

fn open_file(path: &Path) -> Result<Arc<dyn Sink>, LoggingError> {
    let sink = FileSink::open(path).map_err(|source| LoggingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Arc::new(sink))
}

fn invalid(error: ValidationError) -> LoggingError {
    LoggingError::Config(ConfigError::Validation(vec![error]))
}

fn parse_level(owner: String, level: &str) -> Result<Level, LoggingError> {
    level.parse().map_err(|_| {
        invalid(ValidationError::InvalidLevel {
            owner,
            level: level.to_string(),
        })
    })
}

impl Pipeline {
    /// Build a pipeline for `settings` without installing it.
    pub fn from_settings(settings: &Settings) -> Result<Self, LoggingError> {
        match &settings.log_config {
            Some(path) => {
                let config = load_config(path)?;
                Self::from_config(&config)
            }
            None => Self::with_defaults(settings),
        }
    }

    /// Built-in policy: one main sink on the root logger, the storage
    /// threshold, and an optional access-log sink.
    pub fn with_defaults(settings: &Settings) -> Result<Self, LoggingError> {
        let (level, storage_level) = levels_for(settings.verbosity);

        let sink = match &settings.log_file {
            Some(path) => open_rotating(path, MAX_LOG_BYTES, LOG_BACKUP_COUNT)?,
            None => Arc::new(ConsoleSink::stderr()),
        };
        let main = Handler::new("main", sink, LineFormat::main())
            .with_filter(Arc::new(RequestContextFilter::new()));

        let mut pipeline = Pipeline::new(Logger::root().with_level(level).with_handler(Arc::new(main)));
        pipeline.add_logger(Logger::new(STORAGE_LOGGER).with_level(storage_level));

        if let Some(path) = &settings.access_log_file {
            let sink = open_rotating(path, MAX_LOG_BYTES, LOG_BACKUP_COUNT)?;
            let access = Handler::new("access", sink, LineFormat::message_only());
            // Access lines also reach the main log through the root logger.
            pipeline.add_logger(
                Logger::new(ACCESS_LOGGER)
                    .with_handler(Arc::new(access))
                    .with_propagate(true),
            );
        }

        Ok(pipeline)
    }

    /// Build a pipeline from a declarative configuration.
    pub fn from_config(config: &LoggingConfig) -> Result<Self, LoggingError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let mut formats = std::collections::HashMap::new();
        for (name, formatter) in &config.formatters {
            let format = LineFormat::parse(&formatter.format).map_err(|source| {
                invalid(ValidationError::InvalidTemplate {
                    formatter: name.clone(),
                    source,
                })
            })?;
            formats.insert(name.as_str(), format);
        }

        let filters: std::collections::HashMap<&str, Arc<dyn RecordFilter>> = config
            .filters
            .iter()
            .map(|(name, filter)| {
                let filter: Arc<dyn RecordFilter> = match filter {
                    FilterConfig::RequestContext { default } => {
                        Arc::new(RequestContextFilter::with_default(default.clone()))
                    }
                };
                (name.as_str(), filter)
            })
            .collect();

        let mut handlers = std::collections::HashMap::new();
        for (name, handler_config) in &config.handlers {
            let sink = match &handler_config.sink {
                SinkConfig::RotatingFile {
                    path,
                    max_bytes,
                    backup_count,
                } => open_rotating(path, *max_bytes, *backup_count)?,
                SinkConfig::File { path } => open_file(path)?,
                SinkConfig::Console { stream } => Arc::new(ConsoleSink::new(match stream {
                    ConsoleStream::Stdout => Stream::Stdout,
                    ConsoleStream::Stderr => Stream::Stderr,
                })),
            };

            let format = match &handler_config.formatter {
                Some(formatter) => formats.get(formatter.as_str()).cloned().ok_or_else(|| {
                    invalid(ValidationError::UnknownFormatter {
                        handler: name.clone(),
                        formatter: formatter.clone(),
                    })
                })?,
                None => LineFormat::message_only(),
            };

            let mut handler = Handler::new(name.clone(), sink, format);
            if let Some(level) = &handler_config.level {
                handler = handler.with_level(parse_level(format!("handler '{name}'"), level)?);
            }
            for filter_name in &handler_config.filters {
                let filter = filters.get(filter_name.as_str()).cloned().ok_or_else(|| {
                    invalid(ValidationError::UnknownFilter {
                        handler: name.clone(),
                        filter: filter_name.clone(),
                    })
                })?;
                handler = handler.with_filter(filter);
            }
            handlers.insert(name.as_str(), Arc::new(handler));
        }

        let build_logger = |name: &str, logger_config: &crate::config::schema::LoggerConfig| {
            let display = if name.is_empty() { "root" } else { name };
            let mut logger = Logger::new(name).with_propagate(logger_config.propagate);
            if let Some(level) = &logger_config.level {
                logger = logger.with_level(parse_level(format!("logger '{display}'"), level)?);
            }
            for handler_name in &logger_config.handlers {
                let handler = handlers.get(handler_name.as_str()).cloned().ok_or_else(|| {
                    invalid(ValidationError::UnknownHandler {
                        logger: display.to_string(),
                        handler: handler_name.clone(),
                    })
                })?;
                logger = logger.with_handler(handler);
            }
            Ok::<Logger, LoggingError>(logger)
        };

        let mut pipeline = Pipeline::new(build_logger("", &config.root)?);
        for (name, logger_config) in &config.loggers {
            pipeline.add_logger(build_logger(name, logger_config)?);
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::pipeline::ROOT;
    use std::fs;

    #[test]
    fn test_levels_for_verbosity() {
        assert_eq!(levels_for(None), (Level::Info, Level::Info));
        assert_eq!(levels_for(Some(0)), (Level::Info, Level::Info));
        assert_eq!(levels_for(Some(1)), (Level::Debug, Level::Info));
        assert_eq!(levels_for(Some(2)), (Level::Debug, Level::Debug));
        assert_eq!(levels_for(Some(7)), (Level::Debug, Level::Debug));
    }

    #[test]
    fn test_default_mode_console_only() {
        let pipeline = Pipeline::with_defaults(&Settings::default()).unwrap();

        let root = pipeline.root().unwrap();
        assert_eq!(root.level(), Some(Level::Info));
        assert_eq!(root.handlers().len(), 1);
        assert_eq!(pipeline.logger(STORAGE_LOGGER).unwrap().level(), Some(Level::Info));
        assert!(pipeline.logger(ACCESS_LOGGER).is_none());
    }

    #[test]
    fn test_default_mode_verbose_thresholds() {
        let settings = Settings {
            verbosity: Some(1),
            ..Settings::default()
        };
        let pipeline = Pipeline::with_defaults(&settings).unwrap();
        assert_eq!(pipeline.effective_level("homeserver.rooms"), Level::Debug);
        assert_eq!(pipeline.effective_level("homeserver.storage.events"), Level::Info);
    }

    #[test]
    fn test_default_mode_with_access_log() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            log_file: Some(dir.path().join("homeserver.log")),
            access_log_file: Some(dir.path().join("access.log")),
            ..Settings::default()
        };
        let pipeline = Pipeline::with_defaults(&settings).unwrap();

        let access = pipeline.logger(ACCESS_LOGGER).unwrap();
        assert!(access.propagate());
        assert_eq!(access.handlers().len(), 1);
        assert_eq!(pipeline.handlers().len(), 2);
        assert!(dir.path().join("access.log").exists());
    }

    #[test]
    fn test_default_mode_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            log_file: Some(dir.path().join("missing").join("homeserver.log")),
            ..Settings::default()
        };
        assert!(matches!(
            Pipeline::with_defaults(&settings),
            Err(LoggingError::Io { .. })
        ));
    }

    #[test]
    fn test_declarative_mode_builds_loggers() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("custom.log");
        let config_path = dir.path().join("logging.toml");
        fs::write(
            &config_path,
            format!(
                r#"
[formatters.brief]
format = "{{level}} {{request}} {{message}}"

[filters.context]
kind = "request_context"
default = "-"

[handlers.file]
kind = "file"
path = {path:?}
formatter = "brief"
filters = ["context"]

[loggers."homeserver.storage"]
level = "error"
propagate = false
handlers = ["file"]

[root]
level = "info"
handlers = ["file"]
"#,
                path = log_path.display().to_string()
            ),
        )
        .unwrap();

        let settings = Settings {
            verbosity: Some(2),
            log_config: Some(config_path),
            ..Settings::default()
        };
        let pipeline = Pipeline::from_settings(&settings).unwrap();

        // Declarative mode ignores the verbosity-derived defaults.
        assert_eq!(pipeline.effective_level(ROOT), Level::Info);
        assert_eq!(pipeline.effective_level("homeserver.storage"), Level::Error);
        assert!(!pipeline.logger("homeserver.storage").unwrap().propagate());
        assert_eq!(pipeline.handlers().len(), 1);

        pipeline.dispatch(&crate::observability::record::LogRecord::new("homeserver", Level::Info, "hello"));
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "INFO - hello\n");
    }

    #[test]
    fn test_declarative_mode_undeclared_handler() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("logging.toml");
        fs::write(&config_path, "[root]\nlevel = \"info\"\nhandlers = [\"nowhere\"]\n").unwrap();

        let settings = Settings {
            log_config: Some(config_path),
            ..Settings::default()
        };
        assert!(matches!(
            Pipeline::from_settings(&settings),
            Err(LoggingError::Config(ConfigError::Validation(_)))
        ));
    }

    #[test]
    fn test_declarative_mode_missing_file() {
        let settings = Settings {
            log_config: Some("/nonexistent/logging.toml".into()),
            ..Settings::default()
        };
        assert!(matches!(
            Pipeline::from_settings(&settings),
            Err(LoggingError::Config(ConfigError::Io { .. }))
        ));
    }
}
