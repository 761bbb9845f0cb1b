//! Analytical stand-in for a CFD solver.
//!
//! Thin-airfoil lift plus a profile/induced drag build-up, scaled by Reynolds
//! number. Noise and divergence are drawn from an RNG keyed on the geometry id
//! and a seed, so repeated solves of one geometry agree exactly.

use std::f64::consts::PI;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::ports::{CfdSolver, SolveRequest, SolverError, SolverResponse};

const REFERENCE_REYNOLDS: f64 = 500_000.0;
const ASPECT_RATIO: f64 = 5.0;
const OSWALD_EFFICIENCY: f64 = 0.85;
/// Chance of a non-converged solve outside the trusted envelope.
const DIVERGENCE_PROBABILITY: f64 = 0.05;
const DIVERGED_ITERATIONS: u32 = 500;

#[derive(Debug, Clone)]
pub struct SurrogateSolver {
    seed: u64,
    noise: f64,
}

impl SurrogateSolver {
    /// `noise` is the half-width of the multiplicative jitter, e.g. 0.005.
    pub fn new(seed: u64, noise: f64) -> Self {
        Self {
            seed,
            noise: noise.clamp(0.0, 0.5),
        }
    }

    /// Noise-free lift and drag coefficients.
    pub fn coefficients(thickness: f64, max_camber: f64, alpha_deg: f64, reynolds: f64) -> (f64, f64) {
        let mut lift = 2.0 * PI * alpha_deg.to_radians() + max_camber * 0.8;
        if alpha_deg > 10.0 {
            lift *= 0.8;
        } else if alpha_deg > 8.0 {
            lift *= 0.95;
        }

        let profile = 0.006 + 0.02 * thickness * thickness;
        let induced = lift * lift / (PI * ASPECT_RATIO * OSWALD_EFFICIENCY);
        let reynolds_factor = (REFERENCE_REYNOLDS / reynolds).powf(0.2);
        let drag = (profile + induced) * reynolds_factor + max_camber * 0.005;
        (lift, drag)
    }

    fn within_envelope(thickness: f64, alpha_deg: f64) -> bool {
        (0.09..=0.18).contains(&thickness) && alpha_deg.abs() <= 12.0
    }

    fn rng_for(&self, geometry_id: &str) -> StdRng {
        // FNV-1a, stable across builds.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in geometry_id.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        StdRng::seed_from_u64(hash ^ self.seed)
    }
}

#[async_trait]
impl CfdSolver for SurrogateSolver {
    fn name(&self) -> &'static str {
        "surrogate"
    }

    async fn solve(&self, request: SolveRequest) -> Result<SolverResponse, SolverError> {
        if !(request.reynolds.is_finite() && request.reynolds > 0.0) {
            return Err(SolverError::Infrastructure(format!(
                "invalid Reynolds number {}",
                request.reynolds
            )));
        }

        let params = request.parameters;
        let (lift, drag) = Self::coefficients(
            params.thickness(),
            params.max_camber(),
            request.angle_of_attack,
            request.reynolds,
        );

        let mut rng = self.rng_for(&request.geometry_id);
        let jitter = 1.0 - self.noise..=1.0 + self.noise;
        let drag = drag * rng.gen_range(jitter.clone());
        let lift = lift * rng.gen_range(jitter);

        let diverged = !Self::within_envelope(params.thickness(), request.angle_of_attack)
            && rng.gen::<f64>() < DIVERGENCE_PROBABILITY;
        let solver_iterations = if diverged {
            DIVERGED_ITERATIONS
        } else {
            rng.gen_range(180..=250)
        };

        Ok(SolverResponse {
            lift,
            drag,
            converged: !diverged,
            solver_iterations,
        })
    }
}
