//! Convergence monitor: decides, from a snapshot, whether the search goes on.

use tracing::debug;

use crate::domain::models::{
    Constraint, ConvergenceCriteria, EvaluationBudget, HistorySnapshot, RunConfig, StopDecision,
    StopReason,
};

/// Stop rules, checked in priority order:
/// budget-exhausted, converged, stagnant, infeasible-exhausted.
///
/// Windows count batches, not individual evaluations.
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    criteria: ConvergenceCriteria,
    constraints: Vec<Constraint>,
}

impl ConvergenceMonitor {
    pub const fn new(criteria: ConvergenceCriteria, constraints: Vec<Constraint>) -> Self {
        Self {
            criteria,
            constraints,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.convergence.clone(), config.constraints.clone())
    }

    pub fn should_stop(&self, history: &HistorySnapshot, budget: EvaluationBudget) -> StopDecision {
        let used = history.len();
        if budget.is_exhausted(used) {
            return StopDecision::stop(
                StopReason::BudgetExhausted,
                format!(
                    "{used} evaluations reached the budget of {}",
                    budget.max_evaluations
                ),
            );
        }

        let progress = history.batch_progress(&self.constraints);
        let Some(latest) = progress.last() else {
            return StopDecision::Continue;
        };

        if let Some(best_now) = latest.best_feasible_drag {
            let window = self.criteria.window as usize;
            if progress.len() > window {
                if let Some(best_before) = progress[progress.len() - 1 - window].best_feasible_drag {
                    let improvement = self.criteria.improvement.improvement(best_before, best_now);
                    debug!(best_before, best_now, improvement, window, "convergence check");
                    if improvement < self.criteria.epsilon {
                        return StopDecision::stop(
                            StopReason::Converged,
                            format!(
                                "best Cd {best_now:.6} improved by {improvement:.6} over the last {window} batches (epsilon {})",
                                self.criteria.epsilon
                            ),
                        );
                    }
                }
            }
            return StopDecision::Continue;
        }

        let window = self.criteria.stagnation_window as usize;
        if progress.len() > window {
            let before = progress[progress.len() - 1 - window].min_violation;
            let now = latest.min_violation;
            let improved = match (before, now) {
                (None, Some(_)) => true,
                (Some(before), Some(now)) => now < before,
                _ => false,
            };
            if !improved {
                return StopDecision::stop(
                    StopReason::Stagnant,
                    format!(
                        "no feasible design and no reduction in constraint violation over the last {window} batches"
                    ),
                );
            }
        }

        let threshold = ((self.criteria.infeasible_fraction * budget.max_evaluations as f64).ceil()
            as usize)
            .max(1);
        if used >= threshold {
            return StopDecision::stop(
                StopReason::InfeasibleExhausted,
                format!(
                    "{used} of {} evaluations spent without a feasible design; consider relaxing constraints",
                    budget.max_evaluations
                ),
            );
        }

        StopDecision::Continue
    }
}
