//! CFD solver port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::errors::{Classify, FailureKind};
use crate::domain::models::DesignParameters;

/// One solver invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub geometry_id: String,
    pub parameters: DesignParameters,
    pub reynolds: f64,
    /// Degrees.
    pub angle_of_attack: f64,
}

/// Raw solver output. `converged == false` is a numerical result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverResponse {
    pub lift: f64,
    pub drag: f64,
    pub converged: bool,
    #[serde(default)]
    pub solver_iterations: u32,
}

/// Failures that produced no numerical result at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SolverError {
    #[error("Solver timed out: {0}")]
    Timeout(String),

    #[error("Solver infrastructure error: {0}")]
    Infrastructure(String),
}

impl Classify for SolverError {
    fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Timeout(_) => Some(FailureKind::Timeout),
            Self::Infrastructure(_) => Some(FailureKind::InfrastructureError),
        }
    }
}

#[async_trait]
pub trait CfdSolver: Send + Sync {
    /// Short backend name for logs and reports.
    fn name(&self) -> &'static str;

    async fn solve(&self, request: SolveRequest) -> Result<SolverResponse, SolverError>;
}
