use chrono::{DateTime, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

use foilopt::domain::models::{
    AeroCoefficients, Constraint, DesignParameters, EvaluationBudget, EvaluationOutcome,
    ExplorationConfig, HistoryRecord, HistorySnapshot, ParameterSpace, RunConfig,
};
use foilopt::services::{CandidateGenerator, ConvergenceMonitor};

fn history(points: &[([f64; 4], f64, f64)], batch_size: usize) -> HistorySnapshot {
    let space = ParameterSpace::default();
    HistorySnapshot::new(
        points
            .iter()
            .enumerate()
            .map(|(i, &(unit, lift, drag))| HistoryRecord {
                run_id: Uuid::nil(),
                iteration: i as u64 + 1,
                batch: (i / batch_size) as u32,
                parameters: space.denormalize(unit, 4),
                geometry_id: format!("g{i}"),
                outcome: EvaluationOutcome::success(AeroCoefficients::new(lift, drag), 1, 1),
                recorded_at: DateTime::<Utc>::UNIX_EPOCH,
            })
            .collect(),
    )
}

fn unit_point() -> impl Strategy<Value = [f64; 4]> {
    [0.0..=1.0f64, 0.0..=1.0f64, 0.0..=1.0f64, 0.0..=1.0f64]
}

fn evaluated() -> impl Strategy<Value = Vec<([f64; 4], f64, f64)>> {
    prop::collection::vec((unit_point(), 0.0..0.8f64, 0.005..0.05f64), 0..40)
}

fn key(p: &DesignParameters) -> [i64; 4] {
    p.as_array().map(|v| (v * 1e4).round() as i64)
}

proptest! {
    /// Property: every candidate lies inside the parameter space
    #[test]
    fn prop_candidates_in_bounds(points in evaluated(), seed in any::<u64>(), batch_size in 1usize..12) {
        let space = ParameterSpace::default();
        let generator = CandidateGenerator::new(ExplorationConfig::default(), vec![Constraint::min_lift(0.3)], seed);
        let plan = generator.plan_batch(&history(&points, 4), batch_size, &space);

        prop_assert_eq!(plan.candidates.len(), batch_size);
        prop_assert_eq!(plan.explore_count + plan.exploit_count, batch_size);
        for candidate in &plan.candidates {
            prop_assert!(space.contains(candidate), "{} out of bounds", candidate);
        }
    }

    /// Property: candidates within a batch are distinct and avoid evaluated points
    #[test]
    fn prop_candidates_unique(points in evaluated(), seed in any::<u64>(), batch_size in 1usize..12) {
        let snapshot = history(&points, 4);
        let generator = CandidateGenerator::new(ExplorationConfig::default(), vec![Constraint::min_lift(0.3)], seed);
        let plan = generator.plan_batch(&snapshot, batch_size, &ParameterSpace::default());

        let seen: HashSet<[i64; 4]> = snapshot.iter().map(|r| key(&r.parameters)).collect();
        let mut batch = HashSet::new();
        for candidate in &plan.candidates {
            prop_assert!(batch.insert(key(candidate)), "duplicate in batch: {}", candidate);
            prop_assert!(!seen.contains(&key(candidate)), "re-proposed {}", candidate);
        }
    }

    /// Property: same seed and history give the same batch
    #[test]
    fn prop_generation_is_deterministic(points in evaluated(), seed in any::<u64>()) {
        let snapshot = history(&points, 4);
        let generator = CandidateGenerator::new(ExplorationConfig::default(), vec![Constraint::min_lift(0.3)], seed);
        let space = ParameterSpace::default();
        prop_assert_eq!(
            generator.next_batch(&snapshot, 6, &space),
            generator.next_batch(&snapshot, 6, &space)
        );
    }

    /// Property: the monitor never lets a run past its budget by more than one batch
    #[test]
    fn prop_budget_always_stops(points in evaluated(), budget in 1usize..40) {
        let snapshot = history(&points, 4);
        let monitor = ConvergenceMonitor::from_config(&RunConfig::default());
        let decision = monitor.should_stop(&snapshot, EvaluationBudget::new(budget));
        if snapshot.len() >= budget {
            prop_assert!(decision.is_stop());
        }
        prop_assert_eq!(decision.clone(), monitor.should_stop(&snapshot, EvaluationBudget::new(budget)));
    }
}

#[test]
fn test_empty_history_gives_four_distinct_candidates() {
    let space = ParameterSpace::default();
    let generator = CandidateGenerator::from_config(&RunConfig::default());
    let plan = generator.plan_batch(&HistorySnapshot::empty(), 4, &space);

    assert_eq!(plan.explore_count, 4);
    assert_eq!(plan.exploit_count, 0);
    let keys: HashSet<[i64; 4]> = plan.candidates.iter().map(key).collect();
    assert_eq!(keys.len(), 4);
    assert!(plan.candidates.iter().all(|c| space.contains(c)));
}
