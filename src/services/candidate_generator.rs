//! Candidate generator: history snapshot in, next batch of designs out.
//!
//! A pure function of `(history, batch_size, space, seed)`. Part of every
//! batch perturbs an anchor design inside a shrinking trust region
//! (exploit); the rest is drawn from a shifted Halton sequence and picked
//! greedily to maximize distance from everything already sampled (explore).

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::domain::models::{
    Constraint, DesignParameters, ExplorationConfig, HistorySnapshot, ParameterSpace, RunConfig,
    MAX_BATCH_SIZE, PARAMETER_COUNT,
};

const HALTON_BASES: [u64; PARAMETER_COUNT] = [2, 3, 5, 7];

type UnitPoint = [f64; PARAMETER_COUNT];
type DedupKey = [i64; PARAMETER_COUNT];

/// A generated batch plus how it was split, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPlan {
    pub candidates: Vec<DesignParameters>,
    pub explore_count: usize,
    pub exploit_count: usize,
    /// Normalized neighborhood radius, when an anchor existed.
    pub trust_radius: Option<f64>,
    /// Geometry id of the design exploitation perturbed.
    pub anchor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    policy: ExplorationConfig,
    constraints: Vec<Constraint>,
    seed: u64,
}

impl CandidateGenerator {
    pub const fn new(policy: ExplorationConfig, constraints: Vec<Constraint>, seed: u64) -> Self {
        Self {
            policy,
            constraints,
            seed,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            config.exploration.clone(),
            config.constraints.clone(),
            config.seed,
        )
    }

    /// Share of a batch that exploits, given `n` records of history.
    pub fn exploit_weight(&self, n: usize) -> f64 {
        self.policy.max_exploit_fraction * (1.0 - (-(n as f64) / self.policy.exploit_ramp).exp())
    }

    /// `(explore, exploit)` counts for a batch when an anchor exists.
    pub fn split(&self, n: usize, batch_size: usize) -> (usize, usize) {
        let wanted = (self.exploit_weight(n) * batch_size as f64).round() as usize;
        let exploit = wanted.min(batch_size.saturating_sub(self.policy.min_explore));
        (batch_size - exploit, exploit)
    }

    pub fn trust_radius(&self, batches_completed: u32) -> f64 {
        let decayed = self.policy.initial_radius * self.policy.shrink.powi(batches_completed as i32);
        decayed.max(self.policy.min_radius)
    }

    pub fn next_batch(
        &self,
        history: &HistorySnapshot,
        batch_size: usize,
        space: &ParameterSpace,
    ) -> Vec<DesignParameters> {
        self.plan_batch(history, batch_size, space).candidates
    }

    pub fn plan_batch(
        &self,
        history: &HistorySnapshot,
        batch_size: usize,
        space: &ParameterSpace,
    ) -> BatchPlan {
        let mut rng = StdRng::seed_from_u64(mix(self.seed, history.len() as u64));
        let decimals = self.policy.decimals;

        let anchor = history
            .best_feasible(&self.constraints)
            .or_else(|| history.least_violating(&self.constraints).map(|(r, _)| r));

        let mut batch = BatchBuilder {
            space,
            decimals,
            seen_points: history.iter().map(|r| space.normalize(&r.parameters)).collect(),
            seen_keys: history
                .iter()
                .map(|r| dedup_key(&r.parameters, decimals))
                .collect(),
            candidates: Vec::with_capacity(batch_size.min(MAX_BATCH_SIZE)),
        };

        let (mut explore_count, exploit_target) = match anchor {
            Some(_) => self.split(history.len(), batch_size),
            None => (batch_size, 0),
        };

        let mut exploit_count = 0;
        let trust_radius = anchor.map(|_| self.trust_radius(history.batches_completed()));
        if let (Some(record), Some(radius)) = (anchor, trust_radius) {
            let center = space.normalize(&record.parameters);
            for _ in 0..exploit_target {
                if self.exploit_one(&mut rng, &mut batch, center, radius) {
                    exploit_count += 1;
                } else {
                    // Neighborhood saturated; give the slot to exploration.
                    explore_count += 1;
                }
            }
        }

        self.explore(&mut rng, &mut batch, explore_count, history.len());

        debug!(
            history = history.len(),
            batch_size,
            exploit = exploit_count,
            explore = explore_count,
            radius = ?trust_radius,
            "planned batch"
        );

        BatchPlan {
            candidates: batch.candidates,
            explore_count,
            exploit_count,
            trust_radius,
            anchor: anchor.map(|r| r.geometry_id.clone()),
        }
    }

    fn exploit_one(
        &self,
        rng: &mut StdRng,
        batch: &mut BatchBuilder<'_>,
        center: UnitPoint,
        radius: f64,
    ) -> bool {
        let attempts = self.policy.max_resample.max(1);
        for attempt in 0..attempts {
            let mut point = center;
            for value in &mut point {
                *value += rng.gen_range(-radius..=radius);
            }
            let inside = point.iter().all(|v| (0.0..=1.0).contains(v));
            if !inside {
                if attempt + 1 < attempts {
                    continue;
                }
                for value in &mut point {
                    *value = value.clamp(0.0, 1.0);
                }
            }
            if batch.try_accept(point) {
                return true;
            }
        }
        false
    }

    fn explore(&self, rng: &mut StdRng, batch: &mut BatchBuilder<'_>, count: usize, offset: usize) {
        if count == 0 {
            return;
        }
        let shift: UnitPoint = std::array::from_fn(|_| rng.gen::<f64>());
        let pool_size = count
            .checked_mul(self.policy.oversample.max(1))
            .unwrap_or(count);
        let mut next_index = offset as u64 + 1;
        let mut pool: Vec<UnitPoint> = Vec::with_capacity(pool_size.min(MAX_BATCH_SIZE));
        let mut refills = 0;

        let mut placed = 0;
        while placed < count {
            if pool.is_empty() {
                if refills > self.policy.max_resample {
                    break;
                }
                refills += 1;
                for _ in 0..pool_size {
                    pool.push(halton_point(next_index, &shift));
                    next_index += 1;
                }
            }

            let Some(best) = batch.farthest(&pool) else {
                break;
            };
            let point = pool.swap_remove(best);
            if batch.try_accept(point) {
                placed += 1;
            }
        }

        // Pathological spaces (e.g. every bound degenerate) cannot yield
        // unique points; fall back to uniform draws, then accept repeats.
        let mut fallback_attempts = 0;
        while placed < count {
            let point: UnitPoint = std::array::from_fn(|_| rng.gen::<f64>());
            if !batch.try_accept(point) {
                if fallback_attempts < self.policy.max_resample {
                    fallback_attempts += 1;
                    continue;
                }
                batch.push_unchecked(point);
            }
            placed += 1;
        }
    }
}

struct BatchBuilder<'a> {
    space: &'a ParameterSpace,
    decimals: u32,
    seen_points: Vec<UnitPoint>,
    seen_keys: HashSet<DedupKey>,
    candidates: Vec<DesignParameters>,
}

impl BatchBuilder<'_> {
    /// Accepts the point if its rounded design is new to the batch and history.
    fn try_accept(&mut self, point: UnitPoint) -> bool {
        let params = self.space.denormalize(point, self.decimals);
        let key = dedup_key(&params, self.decimals);
        if !self.seen_keys.insert(key) {
            return false;
        }
        self.seen_points.push(self.space.normalize(&params));
        self.candidates.push(params);
        true
    }

    fn push_unchecked(&mut self, point: UnitPoint) {
        let params = self.space.denormalize(point, self.decimals);
        self.seen_points.push(self.space.normalize(&params));
        self.candidates.push(params);
    }

    /// Index of the pool point with the largest distance to its nearest
    /// already-sampled neighbour. Ties go to the earliest pool entry.
    fn farthest(&self, pool: &[UnitPoint]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in pool.iter().enumerate() {
            let nearest = self
                .seen_points
                .iter()
                .map(|p| squared_distance(candidate, p))
                .fold(f64::INFINITY, f64::min);
            match best {
                Some((_, d)) if nearest <= d => {}
                _ => best = Some((i, nearest)),
            }
        }
        best.map(|(i, _)| i)
    }
}

fn dedup_key(params: &DesignParameters, decimals: u32) -> DedupKey {
    let scale = 10_f64.powi(decimals as i32);
    params.as_array().map(|v| (v * scale).round() as i64)
}

fn squared_distance(a: &UnitPoint, b: &UnitPoint) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn radical_inverse(mut index: u64, base: u64) -> f64 {
    let inv_base = 1.0 / base as f64;
    let mut factor = inv_base;
    let mut result = 0.0;
    while index > 0 {
        result += factor * (index % base) as f64;
        index /= base;
        factor *= inv_base;
    }
    result
}

/// Halton point `index` with a Cranley–Patterson rotation.
fn halton_point(index: u64, shift: &UnitPoint) -> UnitPoint {
    std::array::from_fn(|d| (radical_inverse(index, HALTON_BASES[d]) + shift[d]).fract())
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

fn mix(seed: u64, history_len: u64) -> u64 {
    splitmix64(seed ^ splitmix64(history_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        AeroCoefficients, EvaluationOutcome, HistoryRecord, ParameterBound,
    };
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn generator() -> CandidateGenerator {
        CandidateGenerator::new(
            ExplorationConfig::default(),
            vec![Constraint::min_lift(0.30)],
            7,
        )
    }

    fn record(iteration: u64, values: [f64; 4], lift: f64, drag: f64) -> HistoryRecord {
        HistoryRecord {
            run_id: Uuid::nil(),
            iteration,
            batch: (iteration as u32 - 1) / 4,
            parameters: DesignParameters::new(&ParameterSpace::default(), values).unwrap(),
            geometry_id: format!("g{iteration}"),
            outcome: EvaluationOutcome::success(AeroCoefficients::new(lift, drag), 1, 1),
            recorded_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_empty_history_yields_distinct_in_bounds_batch() {
        let space = ParameterSpace {
            thickness: ParameterBound::new(0.08, 0.15),
            ..Default::default()
        };
        let plan = generator().plan_batch(&HistorySnapshot::empty(), 4, &space);
        assert_eq!(plan.candidates.len(), 4);
        assert_eq!(plan.explore_count, 4);
        assert_eq!(plan.exploit_count, 0);
        assert!(plan.trust_radius.is_none());
        for c in &plan.candidates {
            assert!(space.contains(c), "{c} out of bounds");
        }
        let keys: HashSet<_> = plan.candidates.iter().map(|c| dedup_key(c, 4)).collect();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_same_history_and_seed_is_reproducible() {
        let space = ParameterSpace::default();
        let history = HistorySnapshot::new(vec![
            record(1, [0.12, 0.02, 0.4, 2.0], 0.35, 0.015),
            record(2, [0.10, 0.04, 0.3, 4.0], 0.55, 0.018),
        ]);
        let a = generator().next_batch(&history, 6, &space);
        let b = generator().next_batch(&history, 6, &space);
        assert_eq!(a, b);

        let other_seed = CandidateGenerator::new(ExplorationConfig::default(), vec![], 8);
        assert_ne!(a, other_seed.next_batch(&history, 6, &space));
    }

    #[test]
    fn test_exploit_weight_grows_with_history() {
        let g = generator();
        assert!(g.exploit_weight(0).abs() < f64::EPSILON);
        assert!(g.exploit_weight(4) < g.exploit_weight(40));
        assert!(g.exploit_weight(10_000) <= 0.75 + 1e-12);
        let (explore, exploit) = g.split(10_000, 4);
        assert_eq!(explore + exploit, 4);
        assert!(explore >= 1);
    }

    #[test]
    fn test_trust_radius_shrinks_to_floor() {
        let g = generator();
        assert!((g.trust_radius(0) - 0.15).abs() < 1e-12);
        assert!(g.trust_radius(3) < g.trust_radius(2));
        assert!((g.trust_radius(500) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_exploitation_stays_near_anchor() {
        let space = ParameterSpace::default();
        let records: Vec<_> = (1..=40)
            .map(|i| {
                let t = 0.08 + 0.003 * i as f64;
                record(i, [(t * 1e4).round() / 1e4, 0.02, 0.4, 2.0], 0.2, 0.02)
            })
            .chain(std::iter::once(record(41, [0.12, 0.04, 0.4, 5.0], 0.6, 0.011)))
            .collect();
        let history = HistorySnapshot::new(records);
        let g = generator();
        let plan = g.plan_batch(&history, 8, &space);
        assert!(plan.exploit_count > 0);
        assert_eq!(plan.anchor.as_deref(), Some("g41"));

        let anchor = space.normalize(&history.records()[40].parameters);
        let radius = plan.trust_radius.unwrap();
        for c in plan.candidates.iter().take(plan.exploit_count) {
            let unit = space.normalize(c);
            for d in 0..PARAMETER_COUNT {
                assert!((unit[d] - anchor[d]).abs() <= radius + 1e-3);
            }
        }
    }

    #[test]
    fn test_infeasible_history_anchors_on_least_violation() {
        let space = ParameterSpace::default();
        let history = HistorySnapshot::new(
            (1..=30)
                .map(|i| {
                    let lift = if i == 17 { 0.29 } else { 0.1 };
                    let t = 0.08 + 0.004 * i as f64;
                    record(i, [(t * 1e4).round() / 1e4, 0.03, 0.4, 3.0], lift, 0.02)
                })
                .collect(),
        );
        let plan = generator().plan_batch(&history, 4, &space);
        assert_eq!(plan.anchor.as_deref(), Some("g17"));
    }

    #[test]
    fn test_candidates_avoid_history_duplicates() {
        let space = ParameterSpace::default();
        let history = HistorySnapshot::new(vec![record(1, [0.12, 0.02, 0.4, 2.0], 0.35, 0.015)]);
        let batch = generator().next_batch(&history, 8, &space);
        let seen = dedup_key(&history.records()[0].parameters, 4);
        assert!(batch.iter().all(|c| dedup_key(c, 4) != seen));
    }

    #[test]
    fn test_degenerate_space_still_fills_batch() {
        let space = ParameterSpace {
            thickness: ParameterBound::new(0.12, 0.12),
            max_camber: ParameterBound::new(0.02, 0.02),
            camber_position: ParameterBound::new(0.4, 0.4),
            angle_of_attack: ParameterBound::new(2.0, 2.0),
        };
        let batch = generator().next_batch(&HistorySnapshot::empty(), 3, &space);
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|c| space.contains(c)));
    }

    #[test]
    fn test_oversized_oversample_does_not_overflow() {
        let generator = CandidateGenerator::new(
            ExplorationConfig {
                oversample: usize::MAX,
                ..Default::default()
            },
            vec![],
            3,
        );
        let batch = generator.next_batch(&HistorySnapshot::empty(), 3, &ParameterSpace::default());
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_radical_inverse() {
        assert!((radical_inverse(1, 2) - 0.5).abs() < 1e-12);
        assert!((radical_inverse(3, 2) - 0.75).abs() < 1e-12);
        assert!((radical_inverse(1, 3) - 1.0 / 3.0).abs() < 1e-12);
    }
}
