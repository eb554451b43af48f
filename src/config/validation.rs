//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (loggers → handlers → formatters/filters)
//! - Check level names, logger names and format templates
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LoggingConfig → Result<(), Vec<ValidationError>>
//! - Runs before any sink is opened

use thiserror::Error;

use crate::config::schema::{LoggerConfig, LoggingConfig};
use crate::observability::format::{LineFormat, TemplateError};
use crate::observability::record::Level;

/// A single semantic problem in a logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("handler '{handler}' references undeclared formatter '{formatter}'")]
    UnknownFormatter { handler: String, formatter: String },

    #[error("handler '{handler}' references undeclared filter '{filter}'")]
    UnknownFilter { handler: String, filter: String },

    #[error("logger '{logger}' references undeclared handler '{handler}'")]
    UnknownHandler { logger: String, handler: String },

    #[error("{owner} has invalid level '{level}'")]
    InvalidLevel { owner: String, level: String },

    #[error("formatter '{formatter}' is invalid: {source}")]
    InvalidTemplate {
        formatter: String,
        source: TemplateError,
    },

    #[error("'{0}' is not a valid logger name")]
    InvalidLoggerName(String),
}

fn valid_logger_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(|part| !part.is_empty())
}

fn check_level(owner: String, level: Option<&str>, errors: &mut Vec<ValidationError>) {
    if let Some(level) = level {
        if level.parse::<Level>().is_err() {
            errors.push(ValidationError::InvalidLevel {
                owner,
                level: level.to_string(),
            });
        }
    }
}

fn check_logger(name: &str, logger: &LoggerConfig, config: &LoggingConfig, errors: &mut Vec<ValidationError>) {
    check_level(format!("logger '{name}'"), logger.level.as_deref(), errors);
    for handler in &logger.handlers {
        if !config.handlers.contains_key(handler) {
            errors.push(ValidationError::UnknownHandler {
                logger: name.to_string(),
                handler: handler.clone(),
            });
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &LoggingConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (name, formatter) in &config.formatters {
        if let Err(source) = LineFormat::parse(&formatter.format) {
            errors.push(ValidationError::InvalidTemplate {
                formatter: name.clone(),
                source,
            });
        }
    }

    for (name, handler) in &config.handlers {
        if let Some(formatter) = &handler.formatter {
            if !config.formatters.contains_key(formatter) {
                errors.push(ValidationError::UnknownFormatter {
                    handler: name.clone(),
                    formatter: formatter.clone(),
                });
            }
        }
        for filter in &handler.filters {
            if !config.filters.contains_key(filter) {
                errors.push(ValidationError::UnknownFilter {
                    handler: name.clone(),
                    filter: filter.clone(),
                });
            }
        }
        check_level(format!("handler '{name}'"), handler.level.as_deref(), &mut errors);
    }

    for (name, logger) in &config.loggers {
        if !valid_logger_name(name) {
            errors.push(ValidationError::InvalidLoggerName(name.clone()));
        }
        check_logger(name, logger, config, &mut errors);
    }
    check_logger("root", &config.root, config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
