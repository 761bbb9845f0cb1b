//! Evaluator gateway: one geometry in, exactly one outcome out.
//!
//! Stateless apart from its collaborators. Never touches the history store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::retry::{RetryOutcome, RetryPolicy};
use crate::domain::models::{AeroCoefficients, EvaluationOutcome, FailureReason, GeometryDescriptor};
use crate::domain::ports::{CfdSolver, Clock, SolveRequest, SolverError, SystemClock};

#[derive(Clone)]
pub struct EvaluatorGateway {
    solver: Arc<dyn CfdSolver>,
    retry: RetryPolicy,
    reynolds: f64,
    clock: Arc<dyn Clock>,
}

impl EvaluatorGateway {
    pub fn new(solver: Arc<dyn CfdSolver>, retry: RetryPolicy, reynolds: f64) -> Self {
        Self {
            solver,
            retry,
            reynolds,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Same gateway, evaluating at a different Reynolds number.
    #[must_use]
    pub fn at_reynolds(&self, reynolds: f64) -> Self {
        Self {
            reynolds,
            ..self.clone()
        }
    }

    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Longest time a single `evaluate` call can take.
    pub fn max_duration(&self, timeout: Duration) -> Duration {
        timeout * (self.retry.max_retries() + 1) + self.retry.max_total_delay()
    }

    #[instrument(skip(self, geometry, timeout), fields(geometry_id = %geometry.id(), solver = self.solver.name()))]
    pub async fn evaluate(&self, geometry: &GeometryDescriptor, timeout: Duration) -> EvaluationOutcome {
        if !geometry.is_valid() {
            debug!(warnings = ?geometry.warnings(), "geometry rejected before dispatch");
            return EvaluationOutcome::invalid_geometry(geometry.warnings());
        }

        let request = SolveRequest {
            geometry_id: geometry.id().to_string(),
            parameters: *geometry.parameters(),
            reynolds: self.reynolds,
            angle_of_attack: geometry.parameters().angle_of_attack(),
        };

        let started = self.clock.now();
        let RetryOutcome { result, attempts } = self
            .retry
            .execute(|| {
                let solver = Arc::clone(&self.solver);
                let request = request.clone();
                async move {
                    match tokio::time::timeout(timeout, solver.solve(request)).await {
                        Ok(result) => result,
                        Err(_) => Err(SolverError::Timeout(format!(
                            "no response within {} ms",
                            timeout.as_millis()
                        ))),
                    }
                }
            })
            .await;
        let elapsed_ms = (self.clock.now() - started).num_milliseconds().max(0) as u64;

        match result {
            Ok(response) => {
                let coefficients = AeroCoefficients::new(response.lift, response.drag);
                if !coefficients.is_finite() {
                    warn!(lift = response.lift, drag = response.drag, "non-finite coefficients");
                    return EvaluationOutcome::diverged(
                        None,
                        elapsed_ms,
                        attempts,
                        "solver returned non-finite coefficients",
                    );
                }
                if response.converged {
                    debug!(cl = response.lift, cd = response.drag, attempts, "evaluation converged");
                    EvaluationOutcome::success(coefficients, elapsed_ms, attempts)
                } else {
                    debug!(iterations = response.solver_iterations, "solver diverged");
                    EvaluationOutcome::diverged(
                        Some(coefficients),
                        elapsed_ms,
                        attempts,
                        format!(
                            "not converged after {} solver iterations",
                            response.solver_iterations
                        ),
                    )
                }
            }
            Err(SolverError::Timeout(detail)) => {
                EvaluationOutcome::failed(FailureReason::Timeout, elapsed_ms, attempts, detail)
            }
            Err(SolverError::Infrastructure(detail)) => EvaluationOutcome::failed(
                FailureReason::InfrastructureError,
                elapsed_ms,
                attempts,
                detail,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DesignParameters, ParameterSpace};
    use crate::domain::ports::SolverResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedSolver {
        calls: AtomicU32,
        fail_first: u32,
        error: SolverError,
        converged: bool,
    }

    impl ScriptedSolver {
        fn new(fail_first: u32, error: SolverError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
                error,
                converged: true,
            }
        }
    }

    #[async_trait]
    impl CfdSolver for ScriptedSolver {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn solve(&self, _request: SolveRequest) -> Result<SolverResponse, SolverError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(self.error.clone());
            }
            Ok(SolverResponse {
                lift: 0.31,
                drag: 0.0142,
                converged: self.converged,
                solver_iterations: 500,
            })
        }
    }

    struct HangingSolver;

    #[async_trait]
    impl CfdSolver for HangingSolver {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn solve(&self, _request: SolveRequest) -> Result<SolverResponse, SolverError> {
            futures::future::pending().await
        }
    }

    fn geometry(valid: bool) -> GeometryDescriptor {
        let params =
            DesignParameters::new(&ParameterSpace::default(), [0.12, 0.02, 0.4, 2.0]).unwrap();
        GeometryDescriptor::new("NACA2412_a2.0", params, valid, vec!["too thin".to_string()], 0.9)
    }

    fn gateway(solver: Arc<dyn CfdSolver>, retries: u32) -> EvaluatorGateway {
        EvaluatorGateway::new(solver, RetryPolicy::new(retries, 1, 2, 0.1), 500_000.0)
    }

    #[tokio::test]
    async fn test_invalid_geometry_short_circuits() {
        let solver = Arc::new(ScriptedSolver::new(0, SolverError::Timeout(String::new())));
        let outcome = gateway(solver.clone(), 3)
            .evaluate(&geometry(false), Duration::from_secs(1))
            .await;
        assert_eq!(outcome.failure, Some(FailureReason::InvalidGeometry));
        assert_eq!(outcome.attempts, 0);
        assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_infrastructure_error_is_retried() {
        let solver = Arc::new(ScriptedSolver::new(
            2,
            SolverError::Infrastructure("connection refused".to_string()),
        ));
        let outcome = gateway(solver, 3)
            .evaluate(&geometry(true), Duration::from_secs(1))
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_divergence_is_not_retried_and_keeps_coefficients() {
        let mut solver = ScriptedSolver::new(0, SolverError::Timeout(String::new()));
        solver.converged = false;
        let solver = Arc::new(solver);
        let outcome = gateway(solver.clone(), 3)
            .evaluate(&geometry(true), Duration::from_secs(1))
            .await;
        assert_eq!(outcome.failure, Some(FailureReason::SolverDivergence));
        assert_eq!(outcome.drag(), Some(0.0142));
        assert_eq!(solver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_exhausts_retries() {
        let outcome = gateway(Arc::new(HangingSolver), 2)
            .evaluate(&geometry(true), Duration::from_millis(5))
            .await;
        assert_eq!(outcome.failure, Some(FailureReason::Timeout));
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.coefficients.is_none());
    }

    #[test]
    fn test_max_duration_bound() {
        let gw = EvaluatorGateway::new(Arc::new(HangingSolver), RetryPolicy::new(2, 10, 20, 0.0), 1.0);
        assert_eq!(
            gw.max_duration(Duration::from_millis(100)),
            Duration::from_millis(300 + 10 + 20)
        );
    }
}
