//! History records, immutable snapshots, and the search state derived from them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::constraint::{is_feasible, total_violation, Constraint};
use super::design::DesignParameters;
use super::outcome::EvaluationOutcome;

/// Durable unit of the history store. Never edited once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub run_id: Uuid,
    /// Unique, strictly increasing per run. Starts at 1.
    pub iteration: u64,
    /// Zero-based loop iteration the candidate was generated in.
    pub batch: u32,
    pub parameters: DesignParameters,
    pub geometry_id: String,
    pub outcome: EvaluationOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn is_feasible(&self, constraints: &[Constraint]) -> bool {
        is_feasible(constraints, &self.outcome)
    }

    pub fn violation(&self, constraints: &[Constraint]) -> Option<f64> {
        total_violation(constraints, &self.outcome)
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.failure.is_some()
    }
}

/// Cumulative progress after one completed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    pub batch: u32,
    pub evaluations: usize,
    pub feasible_in_batch: usize,
    /// Best feasible drag over every record up to and including this batch.
    pub best_feasible_drag: Option<f64>,
    /// Minimum total constraint violation over converged records so far.
    pub min_violation: Option<f64>,
}

/// Point-in-time, ordered view of a run's history.
///
/// Cloning is cheap; readers never observe appends made after the snapshot
/// was taken.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    records: Arc<[HistoryRecord]>,
}

impl HistorySnapshot {
    pub fn new(records: Vec<HistoryRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn last_iteration(&self) -> Option<u64> {
        self.records.last().map(|r| r.iteration)
    }

    pub fn next_iteration(&self) -> u64 {
        self.last_iteration().map_or(1, |i| i + 1)
    }

    /// Number of batches with at least one committed record.
    pub fn batches_completed(&self) -> u32 {
        self.records.last().map_or(0, |r| r.batch + 1)
    }

    pub fn failure_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_failure()).count()
    }

    pub fn feasible_count(&self, constraints: &[Constraint]) -> usize {
        self.records
            .iter()
            .filter(|r| r.is_feasible(constraints))
            .count()
    }

    /// Minimum drag among feasible records. Ties go to the lowest iteration.
    pub fn best_feasible(&self, constraints: &[Constraint]) -> Option<&HistoryRecord> {
        let mut best: Option<(&HistoryRecord, f64)> = None;
        for record in self.records.iter() {
            if !record.is_feasible(constraints) {
                continue;
            }
            let Some(drag) = record.outcome.drag() else {
                continue;
            };
            match best {
                Some((_, best_drag)) if drag >= best_drag => {}
                _ => best = Some((record, drag)),
            }
        }
        best.map(|(record, _)| record)
    }

    /// Converged record closest to satisfying every constraint.
    pub fn least_violating(&self, constraints: &[Constraint]) -> Option<(&HistoryRecord, f64)> {
        let mut best: Option<(&HistoryRecord, f64)> = None;
        for record in self.records.iter() {
            let Some(violation) = record.violation(constraints) else {
                continue;
            };
            match best {
                Some((_, v)) if violation >= v => {}
                _ => best = Some((record, violation)),
            }
        }
        best
    }

    /// Cumulative progress per batch, in batch order.
    pub fn batch_progress(&self, constraints: &[Constraint]) -> Vec<BatchProgress> {
        let mut progress: Vec<BatchProgress> = Vec::new();
        let mut best_drag: Option<f64> = None;
        let mut min_violation: Option<f64> = None;
        let mut evaluations = 0;

        for record in self.records.iter() {
            evaluations += 1;
            let feasible = record.is_feasible(constraints);
            if feasible {
                if let Some(drag) = record.outcome.drag() {
                    best_drag = Some(best_drag.map_or(drag, |b| b.min(drag)));
                }
            }
            if let Some(v) = record.violation(constraints) {
                min_violation = Some(min_violation.map_or(v, |m| m.min(v)));
            }

            let starts_new = progress.last().is_none_or(|p| p.batch != record.batch);
            if starts_new {
                progress.push(BatchProgress {
                    batch: record.batch,
                    evaluations,
                    feasible_in_batch: 0,
                    best_feasible_drag: best_drag,
                    min_violation,
                });
            }
            if let Some(current) = progress.last_mut() {
                current.evaluations = evaluations;
                current.best_feasible_drag = best_drag;
                current.min_violation = min_violation;
                if feasible {
                    current.feasible_in_batch += 1;
                }
            }
        }
        progress
    }

    /// Best feasible drag after each record, in iteration order.
    pub fn best_feasible_trajectory(&self, constraints: &[Constraint]) -> Vec<Option<f64>> {
        let mut best: Option<f64> = None;
        self.records
            .iter()
            .map(|record| {
                if record.is_feasible(constraints) {
                    if let Some(drag) = record.outcome.drag() {
                        best = Some(best.map_or(drag, |b| b.min(drag)));
                    }
                }
                best
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a HistorySnapshot {
    type Item = &'a HistoryRecord;
    type IntoIter = std::slice::Iter<'a, HistoryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Aggregate view of a run, recomputed from a snapshot on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub best_feasible: Option<HistoryRecord>,
    /// Trailing batches in which the best feasible drag did not improve.
    pub non_improving_batches: u32,
    pub evaluation_count: usize,
    pub failure_count: usize,
    pub feasible_count: usize,
}

impl SearchState {
    pub fn from_snapshot(snapshot: &HistorySnapshot, constraints: &[Constraint]) -> Self {
        let progress = snapshot.batch_progress(constraints);
        let mut non_improving = 0;
        for pair in progress.windows(2).rev() {
            let improved = match (pair[0].best_feasible_drag, pair[1].best_feasible_drag) {
                (None, Some(_)) => true,
                (Some(before), Some(after)) => after < before,
                _ => false,
            };
            if improved {
                break;
            }
            non_improving += 1;
        }

        Self {
            best_feasible: snapshot.best_feasible(constraints).cloned(),
            non_improving_batches: non_improving,
            evaluation_count: snapshot.len(),
            failure_count: snapshot.failure_count(),
            feasible_count: snapshot.feasible_count(constraints),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::design::ParameterSpace;
    use crate::domain::models::outcome::{AeroCoefficients, FailureReason};

    fn record(iteration: u64, batch: u32, outcome: EvaluationOutcome) -> HistoryRecord {
        let space = ParameterSpace::default();
        HistoryRecord {
            run_id: Uuid::nil(),
            iteration,
            batch,
            parameters: DesignParameters::new(&space, [0.12, 0.02, 0.4, 2.0]).unwrap(),
            geometry_id: format!("g{iteration}"),
            outcome,
            recorded_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn ok(lift: f64, drag: f64) -> EvaluationOutcome {
        EvaluationOutcome::success(AeroCoefficients::new(lift, drag), 10, 1)
    }

    #[test]
    fn test_best_feasible_picks_feasible_record() {
        let constraints = vec![Constraint::min_lift(0.30)];
        let snapshot = HistorySnapshot::new(vec![
            record(1, 0, ok(0.31, 0.0142)),
            record(2, 0, ok(0.20, 0.0100)),
        ]);
        let best = snapshot.best_feasible(&constraints).unwrap();
        assert_eq!(best.iteration, 1);
        assert_eq!(
            snapshot.best_feasible(&constraints).map(|r| r.iteration),
            Some(1)
        );
    }

    #[test]
    fn test_best_feasible_tie_goes_to_earliest() {
        let snapshot = HistorySnapshot::new(vec![
            record(1, 0, ok(0.4, 0.015)),
            record(2, 0, ok(0.5, 0.015)),
        ]);
        assert_eq!(snapshot.best_feasible(&[]).unwrap().iteration, 1);
    }

    #[test]
    fn test_next_iteration_starts_at_one() {
        assert_eq!(HistorySnapshot::empty().next_iteration(), 1);
        let snapshot = HistorySnapshot::new(vec![record(7, 2, ok(0.3, 0.02))]);
        assert_eq!(snapshot.next_iteration(), 8);
        assert_eq!(snapshot.batches_completed(), 3);
    }

    #[test]
    fn test_least_violating_ignores_failures() {
        let constraints = vec![Constraint::min_lift(0.5)];
        let snapshot = HistorySnapshot::new(vec![
            record(1, 0, EvaluationOutcome::failed(FailureReason::Timeout, 5, 3, "t")),
            record(2, 0, ok(0.2, 0.01)),
            record(3, 0, ok(0.4, 0.02)),
        ]);
        let (best, violation) = snapshot.least_violating(&constraints).unwrap();
        assert_eq!(best.iteration, 3);
        assert!((violation - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_batch_progress_is_cumulative() {
        let constraints = vec![Constraint::min_lift(0.3)];
        let snapshot = HistorySnapshot::new(vec![
            record(1, 0, ok(0.1, 0.010)),
            record(2, 0, ok(0.4, 0.020)),
            record(3, 1, ok(0.4, 0.030)),
            record(4, 1, ok(0.5, 0.015)),
        ]);
        let progress = snapshot.batch_progress(&constraints);
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].best_feasible_drag, Some(0.020));
        assert_eq!(progress[0].feasible_in_batch, 1);
        assert_eq!(progress[1].best_feasible_drag, Some(0.015));
        assert_eq!(progress[1].evaluations, 4);
    }

    #[test]
    fn test_search_state_counts_non_improving_batches() {
        let snapshot = HistorySnapshot::new(vec![
            record(1, 0, ok(0.4, 0.020)),
            record(2, 1, ok(0.4, 0.015)),
            record(3, 2, ok(0.4, 0.030)),
            record(4, 3, EvaluationOutcome::failed(FailureReason::Timeout, 5, 3, "t")),
        ]);
        let state = SearchState::from_snapshot(&snapshot, &[]);
        assert_eq!(state.non_improving_batches, 2);
        assert_eq!(state.failure_count, 1);
        assert_eq!(state.feasible_count, 3);
        assert_eq!(state.best_feasible.unwrap().iteration, 2);
    }

    #[test]
    fn test_trajectory_is_non_increasing() {
        let snapshot = HistorySnapshot::new(vec![
            record(1, 0, ok(0.4, 0.020)),
            record(2, 0, ok(0.4, 0.025)),
            record(3, 1, ok(0.4, 0.011)),
        ]);
        let trajectory = snapshot.best_feasible_trajectory(&[]);
        assert_eq!(trajectory, vec![Some(0.020), Some(0.020), Some(0.011)]);
    }
}
