//! Configuration loading from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::LoggingConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse '{}': {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot parse '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot parse '{}': {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate a logging configuration.
///
/// Files ending in `.json` are parsed as JSON, `.yaml`/`.yml` as YAML,
/// anything else as TOML.
pub fn load_config(path: &Path) -> Result<LoggingConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: LoggingConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        Some("yaml" | "yml") => serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?,
        _ => toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?,
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ConsoleStream, FilterConfig, SinkConfig};

    const SAMPLE: &str = r#"
[formatters.precise]
format = "{timestamp} - {name} - {line} - {level} - {request} - {message}"

[filters.context]
kind = "request_context"

[handlers.file]
kind = "rotating_file"
path = "homeserver.log"
max_bytes = 2048
formatter = "precise"
filters = ["context"]

[handlers.console]
kind = "console"
stream = "stdout"
level = "warning"

[loggers."homeserver.storage"]
level = "info"

[root]
level = "debug"
handlers = ["file", "console"]
"#;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&write(&dir, "log.toml", SAMPLE)).unwrap();

        assert_eq!(
            config.handlers["file"].sink,
            SinkConfig::RotatingFile {
                path: PathBuf::from("homeserver.log"),
                max_bytes: 2048,
                backup_count: 3,
            }
        );
        assert_eq!(
            config.handlers["console"].sink,
            SinkConfig::Console {
                stream: ConsoleStream::Stdout
            }
        );
        assert_eq!(
            config.filters["context"],
            FilterConfig::RequestContext {
                default: String::new()
            }
        );
        assert!(config.loggers["homeserver.storage"].propagate);
        assert_eq!(config.root.handlers, vec!["file", "console"]);
    }

    #[test]
    fn test_load_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{
            "handlers": { "out": { "kind": "console" } },
            "root": { "level": "info", "handlers": ["out"] }
        }"#;
        let config = load_config(&write(&dir, "log.json", json)).unwrap();
        assert_eq!(config.handlers["out"].formatter, None);
        assert_eq!(config.root.level.as_deref(), Some("info"));
    }

    #[test]
    fn test_load_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = r#"
formatters:
  precise:
    format: "{timestamp} - {name} - {line} - {level} - {request} - {message}"
filters:
  context:
    kind: request_context
handlers:
  file:
    kind: rotating_file
    path: homeserver.log
    max_bytes: 104857600
    backup_count: 10
    formatter: precise
    filters: [context]
loggers:
  homeserver.storage.SQL:
    level: INFO
root:
  level: INFO
  handlers: [file]
"#;
        let config = load_config(&write(&dir, "log.yaml", yaml)).unwrap();
        assert_eq!(
            config.handlers["file"].sink,
            SinkConfig::RotatingFile {
                path: PathBuf::from("homeserver.log"),
                max_bytes: 104_857_600,
                backup_count: 10,
            }
        );
        assert_eq!(config.handlers["file"].filters, vec!["context"]);
        assert_eq!(config.loggers["homeserver.storage.SQL"].level.as_deref(), Some("INFO"));

        let path = write(&dir, "broken.yml", "root: [unclosed");
        assert!(matches!(load_config(&path), Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_unknown_sink_kind_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "log.toml", "[handlers.x]\nkind = \"syslog\"\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn test_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "log.toml", "[root\nlevel = ");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn test_undeclared_handler_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "log.toml", "[root]\nhandlers = [\"missing\"]\n");
        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => assert_eq!(
                errors,
                vec![ValidationError::UnknownHandler {
                    logger: "root".to_string(),
                    handler: "missing".to_string(),
                }]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
