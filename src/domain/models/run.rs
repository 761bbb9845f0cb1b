//! Optimization run lifecycle.
//!
//! A run moves through the loop state machine
//! `Idle → Running → {Converged, BudgetExhausted, Stagnant, InfeasibleExhausted, Failed} → Idle`.
//! Its persisted [`RunStatus`] mirrors that at a coarser grain and adds
//! `Suspended` for runs stopped between batches by a shutdown request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::RunConfig;
use super::convergence::StopReason;
use super::history::HistoryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Running,
    Converged,
    BudgetExhausted,
    Stagnant,
    InfeasibleExhausted,
    /// Something outside the search logic broke, e.g. the history store.
    Failed,
}

impl LoopState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Converged => "converged",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Stagnant => "stagnant",
            Self::InfeasibleExhausted => "infeasible_exhausted",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "converged" => Some(Self::Converged),
            "budget_exhausted" => Some(Self::BudgetExhausted),
            "stagnant" => Some(Self::Stagnant),
            "infeasible_exhausted" => Some(Self::InfeasibleExhausted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Converged
                | Self::BudgetExhausted
                | Self::Stagnant
                | Self::InfeasibleExhausted
                | Self::Failed
        )
    }

    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Idle, Self::Running) => true,
            // Shutdown between batches
            (Self::Running, Self::Idle) => true,
            (Self::Running, next) => next.is_terminal(),
            (from, Self::Idle) => from.is_terminal(),
            _ => false,
        }
    }

    pub const fn from_stop_reason(reason: StopReason) -> Self {
        match reason {
            StopReason::BudgetExhausted => Self::BudgetExhausted,
            StopReason::Converged => Self::Converged,
            StopReason::Stagnant => Self::Stagnant,
            StopReason::InfeasibleExhausted => Self::InfeasibleExhausted,
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Suspended,
    Completed,
    Failed,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "suspended" => Some(Self::Suspended),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Runs that were interrupted can be picked up again.
    pub const fn is_resumable(self) -> bool {
        matches!(self, Self::Running | Self::Suspended)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted metadata for one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub id: Uuid,
    /// Human-readable label, `opt-YYYYMMDD-HHMMSS-xxxxxxxx`.
    pub session: String,
    pub config: RunConfig,
    pub status: RunStatus,
    pub state: LoopState,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OptimizationRun {
    pub fn new(config: RunConfig, now: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::new_v4(), config, now)
    }

    pub fn with_id(id: Uuid, config: RunConfig, now: DateTime<Utc>) -> Self {
        Self {
            id,
            session: session_label(id, now),
            config,
            status: RunStatus::Running,
            state: LoopState::Idle,
            reason: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Record the loop's final state.
    pub fn finish(&mut self, state: LoopState, reason: impl Into<String>, now: DateTime<Utc>) {
        self.state = state;
        self.reason = Some(reason.into());
        self.updated_at = now;
        if state == LoopState::Idle {
            self.status = RunStatus::Suspended;
        } else {
            self.status = if state == LoopState::Failed {
                RunStatus::Failed
            } else {
                RunStatus::Completed
            };
            self.completed_at = Some(now);
        }
    }

    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        self.status = RunStatus::Running;
        self.state = LoopState::Running;
        self.reason = None;
        self.updated_at = now;
    }
}

/// `opt-YYYYMMDD-HHMMSS-` followed by the first eight hex digits of the id.
pub fn session_label(id: Uuid, at: DateTime<Utc>) -> String {
    let simple = id.simple().to_string();
    format!("opt-{}-{}", at.format("%Y%m%d-%H%M%S"), &simple[..8])
}

/// One row per completed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub run_id: Uuid,
    pub batch: u32,
    pub evaluated: usize,
    pub feasible: usize,
    pub failures: usize,
    pub best_drag: Option<f64>,
    pub best_geometry_id: Option<String>,
    pub explore_count: usize,
    pub exploit_count: usize,
    pub trust_radius: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// What a finished (or suspended) loop hands back to its caller.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub state: LoopState,
    pub reason: String,
    pub batches: u32,
    pub evaluations: usize,
    pub best: Option<HistoryRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_state_machine_transitions() {
        assert!(LoopState::Idle.can_transition_to(LoopState::Running));
        assert!(LoopState::Running.can_transition_to(LoopState::Converged));
        assert!(LoopState::Running.can_transition_to(LoopState::Failed));
        assert!(LoopState::Running.can_transition_to(LoopState::Idle));
        assert!(LoopState::Stagnant.can_transition_to(LoopState::Idle));

        assert!(!LoopState::Idle.can_transition_to(LoopState::Converged));
        assert!(!LoopState::Converged.can_transition_to(LoopState::Running));
        assert!(!LoopState::Running.can_transition_to(LoopState::Running));
    }

    #[test]
    fn test_loop_state_round_trip() {
        for state in [
            LoopState::Idle,
            LoopState::Running,
            LoopState::Converged,
            LoopState::BudgetExhausted,
            LoopState::Stagnant,
            LoopState::InfeasibleExhausted,
            LoopState::Failed,
        ] {
            assert_eq!(LoopState::from_str(state.as_str()), Some(state));
        }
    }

    #[test]
    fn test_session_label_format() {
        let id = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(session_label(id, at), "opt-20240309-140507-1a2b3c4d");
    }

    #[test]
    fn test_finish_sets_status() {
        let now = Utc::now();
        let mut run = OptimizationRun::new(RunConfig::default(), now);
        run.finish(LoopState::Converged, "flat", now);
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.completed_at.is_some());

        let mut run = OptimizationRun::new(RunConfig::default(), now);
        run.finish(LoopState::Idle, "shutdown requested", now);
        assert_eq!(run.status, RunStatus::Suspended);
        assert!(run.status.is_resumable());
    }
}
