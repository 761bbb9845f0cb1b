//! Evaluation outcomes returned by the evaluator gateway.

use serde::{Deserialize, Serialize};

use crate::domain::errors::FailureKind;

/// Why an evaluation did not produce a clean, converged result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    InvalidGeometry,
    SolverDivergence,
    Timeout,
    InfrastructureError,
}

impl FailureReason {
    pub const fn as_str(self) -> &'static str {
        self.kind().as_str()
    }

    pub const fn kind(self) -> FailureKind {
        match self {
            Self::InvalidGeometry => FailureKind::InvalidGeometry,
            Self::SolverDivergence => FailureKind::SolverDivergence,
            Self::Timeout => FailureKind::Timeout,
            Self::InfrastructureError => FailureKind::InfrastructureError,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "invalid-geometry" => Some(Self::InvalidGeometry),
            "solver-divergence" => Some(Self::SolverDivergence),
            "timeout" => Some(Self::Timeout),
            "infrastructure-error" => Some(Self::InfrastructureError),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lift and drag coefficients reported by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AeroCoefficients {
    pub lift: f64,
    pub drag: f64,
}

impl AeroCoefficients {
    pub const fn new(lift: f64, drag: f64) -> Self {
        Self { lift, drag }
    }

    pub fn lift_to_drag(&self) -> f64 {
        if self.drag > 0.0 {
            self.lift / self.drag
        } else {
            0.0
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lift.is_finite() && self.drag.is_finite()
    }
}

/// Result of evaluating one geometry. Exactly one exists per candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// Present for converged results and for solver divergence.
    pub coefficients: Option<AeroCoefficients>,
    /// Solver convergence flag.
    pub converged: bool,
    /// Wall-clock cost of the evaluation including retries.
    pub wall_clock_ms: u64,
    /// Number of solver dispatches made (0 when short-circuited).
    pub attempts: u32,
    pub failure: Option<FailureReason>,
    pub detail: Option<String>,
}

impl EvaluationOutcome {
    pub const fn success(coefficients: AeroCoefficients, wall_clock_ms: u64, attempts: u32) -> Self {
        Self {
            coefficients: Some(coefficients),
            converged: true,
            wall_clock_ms,
            attempts,
            failure: None,
            detail: None,
        }
    }

    /// Non-converged solve. The coefficients are kept as a low-quality result.
    pub fn diverged(
        coefficients: Option<AeroCoefficients>,
        wall_clock_ms: u64,
        attempts: u32,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            coefficients,
            converged: false,
            wall_clock_ms,
            attempts,
            failure: Some(FailureReason::SolverDivergence),
            detail: Some(detail.into()),
        }
    }

    pub fn failed(
        reason: FailureReason,
        wall_clock_ms: u64,
        attempts: u32,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            coefficients: None,
            converged: false,
            wall_clock_ms,
            attempts,
            failure: Some(reason),
            detail: Some(detail.into()),
        }
    }

    pub fn invalid_geometry(warnings: &[String]) -> Self {
        let detail = if warnings.is_empty() {
            "geometry rejected".to_string()
        } else {
            warnings.join("; ")
        };
        Self::failed(FailureReason::InvalidGeometry, 0, 0, detail)
    }

    /// Converged with usable coefficients and no failure.
    pub const fn is_success(&self) -> bool {
        self.converged && self.failure.is_none() && self.coefficients.is_some()
    }

    pub fn lift(&self) -> Option<f64> {
        self.coefficients.map(|c| c.lift)
    }

    pub fn drag(&self) -> Option<f64> {
        self.coefficients.map(|c| c.drag)
    }
}
