//! Common test utilities for integration tests
//!
//! Stub solvers, a store that can be made to fail, and a fixed clock.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use foilopt::adapters::geometry::NacaGeometryGenerator;
use foilopt::adapters::memory::InMemoryHistoryStore;
use foilopt::application::OptimizationLoop;
use foilopt::domain::errors::{DomainError, DomainResult};
use foilopt::domain::models::{
    DesignParameters, GeometryDescriptor, HistoryRecord, HistorySnapshot, RunConfig,
};
use foilopt::domain::ports::{
    CfdSolver, Clock, GeometryGenerator, HistoryStore, SolveRequest, SolverError, SolverResponse,
};
use foilopt::services::{EvaluatorGateway, RetryPolicy};

/// Always returns the same coefficients.
pub struct ConstantSolver {
    pub lift: f64,
    pub drag: f64,
    pub calls: AtomicUsize,
}

impl ConstantSolver {
    pub fn new(lift: f64, drag: f64) -> Self {
        Self {
            lift,
            drag,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CfdSolver for ConstantSolver {
    fn name(&self) -> &'static str {
        "constant"
    }

    async fn solve(&self, _request: SolveRequest) -> Result<SolverResponse, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SolverResponse {
            lift: self.lift,
            drag: self.drag,
            converged: true,
            solver_iterations: 100,
        })
    }
}

/// Smooth analytic response: drag grows with thickness and camber, lift with
/// camber and angle of attack. Deterministic.
pub struct AnalyticSolver;

#[async_trait]
impl CfdSolver for AnalyticSolver {
    fn name(&self) -> &'static str {
        "analytic"
    }

    async fn solve(&self, request: SolveRequest) -> Result<SolverResponse, SolverError> {
        Ok(analytic_response(&request))
    }
}

fn analytic_response(request: &SolveRequest) -> SolverResponse {
    let p = request.parameters;
    let lift = 0.11 * p.angle_of_attack() + 8.0 * p.max_camber();
    let drag = 0.006 + 0.05 * p.thickness() * p.thickness() + 0.01 * lift * lift;
    SolverResponse {
        lift,
        drag,
        converged: true,
        solver_iterations: 200,
    }
}

type DelayFn = dyn Fn(usize, &SolveRequest) -> Duration + Send + Sync;

/// Analytic coefficients after a delay chosen per call, so evaluations
/// finish out of dispatch order. Records the order answers came back in.
pub struct StaggeredSolver {
    delay: Box<DelayFn>,
    calls: AtomicUsize,
    pub completed: Mutex<Vec<String>>,
}

impl StaggeredSolver {
    /// Call `n` of each group of `slots` waits `(slots - n) * step_ms`.
    pub fn reversed(step_ms: u64, slots: usize) -> Self {
        Self::with_delay(move |call, _| {
            Duration::from_millis(step_ms * (slots - call % slots) as u64)
        })
    }

    /// Latency derived from the design itself, 0 to 12 ms.
    pub fn design_dependent() -> Self {
        Self::with_delay(|_, request| {
            let spread = request
                .geometry_id
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
            Duration::from_millis((spread % 5) * 3)
        })
    }

    fn with_delay(delay: impl Fn(usize, &SolveRequest) -> Duration + Send + Sync + 'static) -> Self {
        Self {
            delay: Box::new(delay),
            calls: AtomicUsize::new(0),
            completed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CfdSolver for StaggeredSolver {
    fn name(&self) -> &'static str {
        "staggered"
    }

    async fn solve(&self, request: SolveRequest) -> Result<SolverResponse, SolverError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep((self.delay)(call, &request)).await;
        self.completed
            .lock()
            .unwrap()
            .push(request.geometry_id.clone());
        Ok(analytic_response(&request))
    }
}

/// Never answers before the timeout.
pub struct TimeoutSolver;

#[async_trait]
impl CfdSolver for TimeoutSolver {
    fn name(&self) -> &'static str {
        "timeout"
    }

    async fn solve(&self, _request: SolveRequest) -> Result<SolverResponse, SolverError> {
        Err(SolverError::Timeout("solver did not respond".to_string()))
    }
}

/// In-memory store whose appends can be switched to fail.
pub struct FlakyStore {
    inner: InMemoryHistoryStore,
    fail_appends: AtomicBool,
    /// Appends accepted before failures start; `usize::MAX` for never.
    fail_after: usize,
    appended: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_after(run_id: Uuid, fail_after: usize) -> Self {
        Self {
            inner: InMemoryHistoryStore::new(run_id),
            fail_appends: AtomicBool::new(false),
            fail_after,
            appended: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_appends.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl HistoryStore for FlakyStore {
    fn run_id(&self) -> Uuid {
        self.inner.run_id()
    }

    async fn append(&self, record: HistoryRecord) -> DomainResult<()> {
        if self.fail_appends.load(Ordering::SeqCst)
            || self.appended.load(Ordering::SeqCst) >= self.fail_after
        {
            return Err(DomainError::StoreUnavailable("disk unplugged".to_string()));
        }
        self.inner.append(record).await?;
        self.appended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn all_records(&self) -> DomainResult<HistorySnapshot> {
        self.inner.all_records().await
    }
}

/// NACA identities without the manufacturing checks; every shape is valid.
pub struct AlwaysValid;

impl GeometryGenerator for AlwaysValid {
    fn generate(&self, parameters: &DesignParameters) -> GeometryDescriptor {
        GeometryDescriptor::new(
            NacaGeometryGenerator::identity(parameters),
            *parameters,
            true,
            vec![],
            1.0,
        )
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn gateway(solver: Arc<dyn CfdSolver>) -> Arc<EvaluatorGateway> {
    Arc::new(
        EvaluatorGateway::new(solver, RetryPolicy::none(), 500_000.0)
            .with_clock(Arc::new(FixedClock::default())),
    )
}

/// Loop with always-valid geometry, a fixed clock and one append retry.
pub fn build_loop(
    config: RunConfig,
    solver: Arc<dyn CfdSolver>,
    store: Arc<dyn HistoryStore>,
) -> OptimizationLoop {
    build_loop_with(config, Arc::new(AlwaysValid), solver, store)
}

pub fn build_loop_with(
    config: RunConfig,
    geometry: Arc<dyn GeometryGenerator>,
    solver: Arc<dyn CfdSolver>,
    store: Arc<dyn HistoryStore>,
) -> OptimizationLoop {
    OptimizationLoop::new(config, geometry, gateway(solver), store)
    .unwrap()
    .with_clock(Arc::new(FixedClock::default()))
    .with_append_retry(RetryPolicy::new(1, 1, 1, 0.0))
}

pub fn memory_store() -> Arc<InMemoryHistoryStore> {
    Arc::new(InMemoryHistoryStore::new(Uuid::new_v4()))
}
