//! Domain errors for the foilopt search system.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed taxonomy of everything that can go wrong while searching.
///
/// Evaluation failures (`InvalidGeometry`, `SolverDivergence`, `Timeout`,
/// `InfrastructureError`) end up recorded in history; `StoreUnavailable` and
/// `InvalidConfiguration` concern the run itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    InvalidGeometry,
    SolverDivergence,
    Timeout,
    InfrastructureError,
    StoreUnavailable,
    InvalidConfiguration,
}

impl FailureKind {
    /// Transient failures carry no information about the design and may be
    /// retried. Everything else is either deterministic or fatal.
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::InfrastructureError | Self::StoreUnavailable
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidGeometry => "invalid-geometry",
            Self::SolverDivergence => "solver-divergence",
            Self::Timeout => "timeout",
            Self::InfrastructureError => "infrastructure-error",
            Self::StoreUnavailable => "store-unavailable",
            Self::InvalidConfiguration => "invalid-configuration",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can be classified into a [`FailureKind`] for retry decisions.
pub trait Classify {
    /// `None` means the error is outside the retry taxonomy and is never retried.
    fn failure_kind(&self) -> Option<FailureKind>;
}

/// Domain-level errors that can occur in the foilopt system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Parameter {parameter} = {value} is outside [{min}, {max}]")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("History store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Iteration {attempted} conflicts with committed history (last committed: {last:?})")]
    IterationConflict { attempted: u64, last: Option<u64> },

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl Classify for DomainError {
    fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::StoreUnavailable(_) => Some(FailureKind::StoreUnavailable),
            Self::InvalidConfiguration(_) | Self::ParameterOutOfRange { .. } => {
                Some(FailureKind::InvalidConfiguration)
            }
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
