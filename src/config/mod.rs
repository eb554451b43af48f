//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line (LoggingArgs)
//!     → settings.rs (resolve paths)
//!     → Settings (immutable)
//!
//! Settings.log_config, when present:
//!     config file (TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LoggingConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Settings are resolved once; there is no reload path
//! - All schema fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod settings;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::LoggingConfig;
pub use settings::{LoggingArgs, Settings};
pub use validation::ValidationError;
