//! Structured logging with tracing and tracing-subscriber:
//! - JSON or pretty console output
//! - rolling JSON log files

pub mod config;
pub mod logger;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
