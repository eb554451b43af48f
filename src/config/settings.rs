//! Resolved logging settings and the command-line arguments that produce them.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args};

/// Logging settings, resolved once before initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Verbosity; `None` and `Some(0)` both mean the quietest default.
    pub verbosity: Option<u8>,

    /// Main log file; console when absent.
    pub log_file: Option<PathBuf>,

    /// Access log file; no access log when absent.
    pub access_log_file: Option<PathBuf>,

    /// Declarative config file; overrides every other setting when present.
    pub log_config: Option<PathBuf>,
}

impl Settings {
    /// Make every relative path absolute against `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for path in [&mut self.log_file, &mut self.access_log_file, &mut self.log_config]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}

/// Logging flags of the server command line.
#[derive(Debug, Clone, Args)]
pub struct LoggingArgs {
    /// The verbosity level.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// File to log to. Pass an empty value to log to the console.
    #[arg(short = 'f', long = "log-file", default_value = "homeserver.log")]
    pub log_file: String,

    /// Logging config file (TOML, or JSON with a .json extension).
    #[arg(long = "log-config")]
    pub log_config: Option<PathBuf>,

    /// File to log server access to. Pass an empty value to disable.
    #[arg(long = "access-log-file", default_value = "access.log")]
    pub access_log_file: String,
}

fn non_empty(path: String) -> Option<PathBuf> {
    (!path.is_empty()).then(|| PathBuf::from(path))
}

impl LoggingArgs {
    /// Resolve the flags into [`Settings`], with paths relative to `base`.
    pub fn into_settings(self, base: &Path) -> Settings {
        Settings {
            verbosity: (self.verbose > 0).then_some(self.verbose),
            log_file: non_empty(self.log_file),
            access_log_file: non_empty(self.access_log_file),
            log_config: self.log_config,
        }
        .resolve_paths(base)
    }
}
