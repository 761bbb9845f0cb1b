//! Inequality constraints over evaluation outcomes.

use serde::{Deserialize, Serialize};

use super::outcome::{AeroCoefficients, EvaluationOutcome};
use crate::domain::errors::{DomainError, DomainResult};

/// Outcome quantity a constraint is expressed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeField {
    Lift,
    Drag,
    LiftToDrag,
}

impl OutcomeField {
    pub fn extract(self, coefficients: &AeroCoefficients) -> f64 {
        match self {
            Self::Lift => coefficients.lift,
            Self::Drag => coefficients.drag,
            Self::LiftToDrag => coefficients.lift_to_drag(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lift => "Cl",
            Self::Drag => "Cd",
            Self::LiftToDrag => "L/D",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    AtLeast,
    AtMost,
}

/// A named inequality, e.g. `Cl >= 0.30`. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub field: OutcomeField,
    pub comparison: Comparison,
    pub bound: f64,
}

impl Constraint {
    pub fn new(
        name: impl Into<String>,
        field: OutcomeField,
        comparison: Comparison,
        bound: f64,
    ) -> Self {
        Self {
            name: name.into(),
            field,
            comparison,
            bound,
        }
    }

    /// The lift requirement every airfoil run starts from.
    pub fn min_lift(bound: f64) -> Self {
        Self::new("min_lift", OutcomeField::Lift, Comparison::AtLeast, bound)
    }

    pub fn max_drag(bound: f64) -> Self {
        Self::new("max_drag", OutcomeField::Drag, Comparison::AtMost, bound)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "constraint name cannot be empty".to_string(),
            ));
        }
        if !self.bound.is_finite() {
            return Err(DomainError::InvalidConfiguration(format!(
                "constraint '{}' bound must be finite",
                self.name
            )));
        }
        Ok(())
    }

    /// Distance by which the coefficients miss the bound (0.0 when satisfied).
    pub fn violation(&self, coefficients: &AeroCoefficients) -> f64 {
        let value = self.field.extract(coefficients);
        let miss = match self.comparison {
            Comparison::AtLeast => self.bound - value,
            Comparison::AtMost => value - self.bound,
        };
        miss.max(0.0)
    }

    pub fn is_satisfied(&self, coefficients: &AeroCoefficients) -> bool {
        self.violation(coefficients) <= 0.0
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.comparison {
            Comparison::AtLeast => ">=",
            Comparison::AtMost => "<=",
        };
        write!(f, "{}: {} {} {}", self.name, self.field.as_str(), op, self.bound)
    }
}

/// Summed violation across all constraints, or `None` when the outcome has no
/// usable converged coefficients.
pub fn total_violation(constraints: &[Constraint], outcome: &EvaluationOutcome) -> Option<f64> {
    if !outcome.is_success() {
        return None;
    }
    let coefficients = outcome.coefficients.as_ref()?;
    Some(constraints.iter().map(|c| c.violation(coefficients)).sum())
}

/// A feasible outcome is a converged success that satisfies every constraint.
pub fn is_feasible(constraints: &[Constraint], outcome: &EvaluationOutcome) -> bool {
    total_violation(constraints, outcome).is_some_and(|v| v <= 0.0)
}
