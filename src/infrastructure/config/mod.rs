//! Configuration loading
//!
//! Layered with figment: defaults, project YAML files, then `FOILOPT_*`
//! environment variables. Validated after extraction.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR};
