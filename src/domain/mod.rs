//! Domain layer for foilopt
//!
//! Design parameters, evaluation outcomes, history, and the ports the
//! search core depends on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{Classify, DomainError, DomainResult, FailureKind};
