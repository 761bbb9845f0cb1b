//! Post-run report assembled from run metadata and its history.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::{
    DesignParameters, HistorySnapshot, LoopState, OptimizationRun, RunStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestDesign {
    pub iteration: u64,
    pub geometry_id: String,
    pub parameters: DesignParameters,
    pub lift: f64,
    pub drag: f64,
    pub lift_to_drag: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub session: String,
    pub status: RunStatus,
    pub state: LoopState,
    pub reason: Option<String>,
    pub evaluations: usize,
    pub batches: u32,
    pub feasible_count: usize,
    /// Failure reason → count.
    pub failures: BTreeMap<String, usize>,
    pub constraints: Vec<String>,
    /// Drag of the first feasible design found.
    pub initial_cd: Option<f64>,
    /// Drag of the best feasible design.
    pub final_cd: Option<f64>,
    pub improvement_pct: Option<f64>,
    pub constraint_satisfied: bool,
    pub best: Option<BestDesign>,
}

impl RunReport {
    pub fn build(run: &OptimizationRun, history: &HistorySnapshot) -> Self {
        let constraints = &run.config.constraints;

        let mut failures = BTreeMap::new();
        for record in history {
            if let Some(reason) = record.outcome.failure {
                *failures.entry(reason.as_str().to_string()).or_insert(0) += 1;
            }
        }

        let initial_cd = history
            .iter()
            .find(|r| r.is_feasible(constraints))
            .and_then(|r| r.outcome.drag());

        let best = history.best_feasible(constraints).and_then(|record| {
            let coefficients = record.outcome.coefficients?;
            Some(BestDesign {
                iteration: record.iteration,
                geometry_id: record.geometry_id.clone(),
                parameters: record.parameters,
                lift: coefficients.lift,
                drag: coefficients.drag,
                lift_to_drag: coefficients.lift_to_drag(),
            })
        });
        let final_cd = best.as_ref().map(|b| b.drag);

        let improvement_pct = match (initial_cd, final_cd) {
            (Some(initial), Some(last)) if initial > 0.0 => Some((initial - last) / initial * 100.0),
            _ => None,
        };

        Self {
            run_id: run.id,
            session: run.session.clone(),
            status: run.status,
            state: run.state,
            reason: run.reason.clone(),
            evaluations: history.len(),
            batches: history.batches_completed(),
            feasible_count: history.feasible_count(constraints),
            failures,
            constraints: constraints.iter().map(ToString::to_string).collect(),
            initial_cd,
            final_cd,
            improvement_pct,
            constraint_satisfied: best.is_some(),
            best,
        }
    }
}
