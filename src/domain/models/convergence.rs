//! Stop criteria and decisions.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Why a search stopped. Every reason represents expected termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    BudgetExhausted,
    Converged,
    Stagnant,
    InfeasibleExhausted,
}

impl StopReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BudgetExhausted => "budget-exhausted",
            Self::Converged => "converged",
            Self::Stagnant => "stagnant",
            Self::InfeasibleExhausted => "infeasible-exhausted",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum StopDecision {
    Continue,
    Stop { reason: StopReason, detail: String },
}

impl StopDecision {
    pub fn stop(reason: StopReason, detail: impl Into<String>) -> Self {
        Self::Stop {
            reason,
            detail: detail.into(),
        }
    }

    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop { .. })
    }

    pub const fn reason(&self) -> Option<StopReason> {
        match self {
            Self::Continue => None,
            Self::Stop { reason, .. } => Some(*reason),
        }
    }
}

/// Hard cap on evaluations, counting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationBudget {
    pub max_evaluations: usize,
}

impl EvaluationBudget {
    pub const fn new(max_evaluations: usize) -> Self {
        Self { max_evaluations }
    }

    pub const fn is_exhausted(&self, used: usize) -> bool {
        used >= self.max_evaluations
    }

    pub const fn remaining(&self, used: usize) -> usize {
        self.max_evaluations.saturating_sub(used)
    }

    /// Upper bound on batches needed to spend the budget.
    pub const fn max_batches(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            return 0;
        }
        self.max_evaluations.div_ceil(batch_size)
    }
}

/// How improvement in best drag is measured across the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementMeasure {
    /// `before - after`
    Absolute,
    /// `(before - after) / before`
    Relative,
}

impl ImprovementMeasure {
    pub fn improvement(self, before: f64, after: f64) -> f64 {
        let delta = before - after;
        match self {
            Self::Absolute => delta,
            Self::Relative if before.abs() > f64::EPSILON => delta / before.abs(),
            Self::Relative => delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConvergenceCriteria {
    /// Minimum improvement over `window` batches to keep going.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Batches looked back over for the converged test.
    #[serde(default = "default_window")]
    pub window: u32,

    /// Batches without violation improvement before declaring stagnation.
    #[serde(default = "default_stagnation_window")]
    pub stagnation_window: u32,

    /// Fraction of the budget that may be spent without any feasible record.
    #[serde(default = "default_infeasible_fraction")]
    pub infeasible_fraction: f64,

    #[serde(default = "default_improvement")]
    pub improvement: ImprovementMeasure,
}

const fn default_epsilon() -> f64 {
    0.005
}

const fn default_window() -> u32 {
    3
}

const fn default_stagnation_window() -> u32 {
    4
}

const fn default_infeasible_fraction() -> f64 {
    0.5
}

const fn default_improvement() -> ImprovementMeasure {
    ImprovementMeasure::Relative
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            window: default_window(),
            stagnation_window: default_stagnation_window(),
            infeasible_fraction: default_infeasible_fraction(),
            improvement: default_improvement(),
        }
    }
}

impl ConvergenceCriteria {
    pub fn validate(&self) -> DomainResult<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(DomainError::InvalidConfiguration(format!(
                "convergence epsilon must be a non-negative number, got {}",
                self.epsilon
            )));
        }
        if self.window == 0 {
            return Err(DomainError::InvalidConfiguration(
                "convergence window must be at least 1".to_string(),
            ));
        }
        if self.stagnation_window == 0 {
            return Err(DomainError::InvalidConfiguration(
                "stagnation window must be at least 1".to_string(),
            ));
        }
        if !(self.infeasible_fraction > 0.0 && self.infeasible_fraction <= 1.0) {
            return Err(DomainError::InvalidConfiguration(format!(
                "infeasible fraction must be in (0, 1], got {}",
                self.infeasible_fraction
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_max_batches_rounds_up() {
        assert_eq!(EvaluationBudget::new(10).max_batches(4), 3);
        assert_eq!(EvaluationBudget::new(8).max_batches(4), 2);
        assert!(EvaluationBudget::new(8).is_exhausted(9));
    }

    #[test]
    fn test_relative_improvement() {
        let imp = ImprovementMeasure::Relative.improvement(0.020, 0.019);
        assert!((imp - 0.05).abs() < 1e-12);
        let imp = ImprovementMeasure::Absolute.improvement(0.020, 0.019);
        assert!((imp - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_criteria_validation() {
        assert!(ConvergenceCriteria::default().validate().is_ok());
        let bad = ConvergenceCriteria {
            window: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = ConvergenceCriteria {
            infeasible_fraction: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_stop_reason_strings() {
        assert_eq!(StopReason::InfeasibleExhausted.to_string(), "infeasible-exhausted");
        let decision = StopDecision::stop(StopReason::Converged, "flat");
        assert_eq!(decision.reason(), Some(StopReason::Converged));
        assert!(!StopDecision::Continue.is_stop());
    }
}
