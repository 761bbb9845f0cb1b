//! Optimization loop - drives batches until a stop rule fires
//!
//! Per batch:
//! - plan candidates from an immutable history snapshot
//! - evaluate them concurrently, bounded by a semaphore
//! - append each outcome as it completes (this task is the only writer)
//! - re-read the history and consult the convergence monitor
//!
//! Terminal transitions happen only between batches.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, watch, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    EvaluationOutcome, FailureReason, GeometryDescriptor, HistoryRecord, HistorySnapshot,
    IterationSummary, LoopState, RunConfig, RunOutcome, StopDecision,
};
use crate::domain::ports::{Clock, GeometryGenerator, HistoryStore, RunRepository, SystemClock};
use crate::services::candidate_generator::{BatchPlan, CandidateGenerator};
use crate::services::convergence_monitor::ConvergenceMonitor;
use crate::services::evaluator_gateway::EvaluatorGateway;
use crate::services::retry::RetryPolicy;

/// Progress notifications for observers such as the CLI progress bar.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    BatchStarted {
        batch: u32,
        size: usize,
        explore: usize,
        exploit: usize,
    },
    CandidateEvaluated {
        iteration: u64,
        geometry_id: String,
        outcome: EvaluationOutcome,
    },
    BatchCompleted(IterationSummary),
    Finished {
        state: LoopState,
        reason: String,
    },
}

/// Requests a stop at the next batch boundary.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        info!("shutdown requested; stopping after the current batch");
        self.tx.send_replace(true);
    }
}

pub struct OptimizationLoop {
    run_id: Uuid,
    config: RunConfig,
    geometry: Arc<dyn GeometryGenerator>,
    gateway: Arc<EvaluatorGateway>,
    store: Arc<dyn HistoryStore>,
    runs: Option<Arc<dyn RunRepository>>,
    generator: CandidateGenerator,
    monitor: ConvergenceMonitor,
    clock: Arc<dyn Clock>,
    append_retry: RetryPolicy,
    events: Option<mpsc::Sender<LoopEvent>>,
    state: RwLock<LoopState>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl OptimizationLoop {
    /// Validates the configuration before anything is dispatched.
    pub fn new(
        config: RunConfig,
        geometry: Arc<dyn GeometryGenerator>,
        gateway: Arc<EvaluatorGateway>,
        store: Arc<dyn HistoryStore>,
    ) -> DomainResult<Self> {
        config.validate()?;
        let shutdown_tx = Arc::new(watch::Sender::new(false));
        Ok(Self {
            run_id: store.run_id(),
            generator: CandidateGenerator::from_config(&config),
            monitor: ConvergenceMonitor::from_config(&config),
            config,
            geometry,
            gateway,
            store,
            runs: None,
            clock: Arc::new(SystemClock),
            append_retry: RetryPolicy::new(5, 100, 5_000, 0.2),
            events: None,
            state: RwLock::new(LoopState::Idle),
            shutdown_tx,
        })
    }

    #[must_use]
    pub fn with_run_repository(mut self, runs: Arc<dyn RunRepository>) -> Self {
        self.runs = Some(runs);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: mpsc::Sender<LoopEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub const fn with_append_retry(mut self, policy: RetryPolicy) -> Self {
        self.append_retry = policy;
        self
    }

    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn state(&self) -> LoopState {
        *self.state.read().await
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Return a finished loop to `Idle` and clear any pending shutdown.
    pub async fn reset(&self) -> DomainResult<()> {
        self.transition(LoopState::Idle).await?;
        self.shutdown_tx.send_replace(false);
        Ok(())
    }

    async fn transition(&self, next: LoopState) -> DomainResult<()> {
        let mut state = self.state.write().await;
        if !state.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: state.to_string(),
                to: next.to_string(),
            });
        }
        debug!(from = %*state, to = %next, "loop state transition");
        *state = next;
        Ok(())
    }

    /// Run until a stop rule fires, the store fails, or shutdown is requested.
    ///
    /// A non-empty history is treated as a resume: the monitor is consulted
    /// before anything is dispatched and numbering continues from the last
    /// committed iteration.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub async fn run(&self) -> DomainResult<RunOutcome> {
        self.transition(LoopState::Running).await?;
        self.mark_run_started().await;
        let budget = self.config.budget();

        let mut snapshot = match self.read_history().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                return self
                    .finish(LoopState::Failed, format!("history unavailable: {err}"), &HistorySnapshot::empty())
                    .await;
            }
        };
        info!(
            existing = snapshot.len(),
            budget = budget.max_evaluations,
            batch_size = self.config.batch_size,
            "optimization loop started"
        );

        loop {
            if !snapshot.is_empty() {
                if let StopDecision::Stop { reason, detail } =
                    self.monitor.should_stop(&snapshot, budget)
                {
                    info!(reason = %reason, %detail, "stop rule fired");
                    return self
                        .finish(LoopState::from_stop_reason(reason), detail, &snapshot)
                        .await;
                }
            }

            if *self.shutdown_tx.borrow() {
                return self
                    .finish(LoopState::Idle, "shutdown requested".to_string(), &snapshot)
                    .await;
            }

            let batch = snapshot.batches_completed();
            let plan = self.generator.plan_batch(
                &snapshot,
                self.config.batch_size,
                &self.config.parameter_space,
            );
            self.emit(LoopEvent::BatchStarted {
                batch,
                size: plan.candidates.len(),
                explore: plan.explore_count,
                exploit: plan.exploit_count,
            })
            .await;

            if let Err(err) = self.run_batch(batch, &plan, snapshot.next_iteration()).await {
                error!(batch, error = %err, "batch could not be committed");
                let snapshot = self.read_history().await.unwrap_or(snapshot);
                return self
                    .finish(LoopState::Failed, format!("history append failed: {err}"), &snapshot)
                    .await;
            }

            snapshot = match self.read_history().await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    return self
                        .finish(LoopState::Failed, format!("history unavailable: {err}"), &snapshot)
                        .await;
                }
            };
            self.record_summary(batch, &plan, &snapshot).await;
        }
    }

    /// Evaluate every candidate and append every outcome. Returns only after
    /// all dispatched evaluations have resolved.
    ///
    /// Outcomes are appended in slot order: a finished slot is committed as
    /// soon as every earlier slot has been committed, so iteration numbers
    /// never depend on which evaluation finished first.
    async fn run_batch(&self, batch: u32, plan: &BatchPlan, first_iteration: u64) -> DomainResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let timeout = Duration::from_millis(self.config.evaluation_timeout_ms);
        let mut geometries: Vec<GeometryDescriptor> = Vec::with_capacity(plan.candidates.len());
        let mut tasks = JoinSet::new();

        for (slot, parameters) in plan.candidates.iter().enumerate() {
            let geometry = self.geometry.generate(parameters);
            geometries.push(geometry.clone());

            let gateway = Arc::clone(&self.gateway);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => AssertUnwindSafe(gateway.evaluate(&geometry, timeout))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| {
                            EvaluationOutcome::failed(
                                FailureReason::InfrastructureError,
                                0,
                                1,
                                format!("evaluation panicked: {}", panic_message(&*panic)),
                            )
                        }),
                    Err(_) => EvaluationOutcome::failed(
                        FailureReason::InfrastructureError,
                        0,
                        0,
                        "dispatch semaphore closed",
                    ),
                };
                (slot, outcome)
            });
        }

        let mut ready: Vec<Option<EvaluationOutcome>> = vec![None; geometries.len()];
        let mut next_slot = 0;
        let mut next_iteration = first_iteration;
        let mut append_error: Option<DomainError> = None;

        while let Some(joined) = tasks.join_next().await {
            let (slot, outcome) = match joined {
                Ok(result) => result,
                Err(join_err) => {
                    warn!(error = %join_err, "evaluation task did not complete");
                    continue;
                }
            };
            if let Some(entry) = ready.get_mut(slot) {
                *entry = Some(outcome);
            }
            while let Some(outcome) = ready.get_mut(next_slot).and_then(Option::take) {
                self.commit(batch, &mut next_iteration, &geometries[next_slot], outcome, &mut append_error)
                    .await;
                next_slot += 1;
            }
        }

        // Slots whose task was lost to cancellation still get exactly one record.
        for (geometry, outcome) in geometries.iter().zip(ready).skip(next_slot) {
            let outcome = outcome.unwrap_or_else(|| {
                EvaluationOutcome::failed(
                    FailureReason::InfrastructureError,
                    0,
                    0,
                    "evaluation task was cancelled",
                )
            });
            self.commit(batch, &mut next_iteration, geometry, outcome, &mut append_error)
                .await;
        }

        append_error.map_or(Ok(()), Err)
    }

    async fn commit(
        &self,
        batch: u32,
        next_iteration: &mut u64,
        geometry: &GeometryDescriptor,
        outcome: EvaluationOutcome,
        append_error: &mut Option<DomainError>,
    ) {
        if append_error.is_some() {
            warn!(geometry_id = %geometry.id(), "outcome not persisted; store already failed");
            return;
        }
        let record = HistoryRecord {
            run_id: self.run_id,
            iteration: *next_iteration,
            batch,
            parameters: *geometry.parameters(),
            geometry_id: geometry.id().to_string(),
            outcome,
            recorded_at: self.clock.now(),
        };
        match self.append(record.clone()).await {
            Ok(()) => {
                *next_iteration += 1;
                self.emit(LoopEvent::CandidateEvaluated {
                    iteration: record.iteration,
                    geometry_id: record.geometry_id,
                    outcome: record.outcome,
                })
                .await;
            }
            Err(err) => *append_error = Some(err),
        }
    }

    async fn append(&self, record: HistoryRecord) -> DomainResult<()> {
        self.append_retry
            .execute(|| {
                let store = Arc::clone(&self.store);
                let record = record.clone();
                async move { store.append(record).await }
            })
            .await
            .result
    }

    async fn read_history(&self) -> DomainResult<HistorySnapshot> {
        self.append_retry
            .execute(|| {
                let store = Arc::clone(&self.store);
                async move { store.all_records().await }
            })
            .await
            .result
    }

    async fn record_summary(&self, batch: u32, plan: &BatchPlan, snapshot: &HistorySnapshot) {
        let constraints = &self.config.constraints;
        let in_batch: Vec<&HistoryRecord> = snapshot.iter().filter(|r| r.batch == batch).collect();
        let best = snapshot.best_feasible(constraints);
        let summary = IterationSummary {
            run_id: self.run_id,
            batch,
            evaluated: in_batch.len(),
            feasible: in_batch.iter().filter(|r| r.is_feasible(constraints)).count(),
            failures: in_batch.iter().filter(|r| r.is_failure()).count(),
            best_drag: best.and_then(|r| r.outcome.drag()),
            best_geometry_id: best.map(|r| r.geometry_id.clone()),
            explore_count: plan.explore_count,
            exploit_count: plan.exploit_count,
            trust_radius: plan.trust_radius,
            recorded_at: self.clock.now(),
        };
        info!(
            batch,
            evaluated = summary.evaluated,
            feasible = summary.feasible,
            failures = summary.failures,
            best_cd = ?summary.best_drag,
            "batch complete"
        );
        if let Some(runs) = &self.runs {
            if let Err(err) = runs.record_summary(&summary).await {
                warn!(batch, error = %err, "failed to record iteration summary");
            }
        }
        self.emit(LoopEvent::BatchCompleted(summary)).await;
    }

    async fn mark_run_started(&self) {
        let Some(runs) = &self.runs else {
            return;
        };
        match runs.get(self.run_id).await {
            Ok(Some(mut run)) => {
                run.mark_running(self.clock.now());
                if let Err(err) = runs.update(&run).await {
                    warn!(error = %err, "failed to mark run as running");
                }
            }
            Ok(None) => warn!("run metadata missing; continuing without it"),
            Err(err) => warn!(error = %err, "failed to load run metadata"),
        }
    }

    async fn finish(
        &self,
        state: LoopState,
        reason: String,
        snapshot: &HistorySnapshot,
    ) -> DomainResult<RunOutcome> {
        self.transition(state).await?;

        if let Some(runs) = &self.runs {
            match runs.get(self.run_id).await {
                Ok(Some(mut run)) => {
                    run.finish(state, reason.clone(), self.clock.now());
                    if let Err(err) = runs.update(&run).await {
                        warn!(error = %err, "failed to persist final run state");
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "failed to load run metadata"),
            }
        }

        let outcome = RunOutcome {
            run_id: self.run_id,
            state,
            reason: reason.clone(),
            batches: snapshot.batches_completed(),
            evaluations: snapshot.len(),
            best: snapshot.best_feasible(&self.config.constraints).cloned(),
        };
        info!(
            state = %state,
            %reason,
            evaluations = outcome.evaluations,
            batches = outcome.batches,
            best_cd = ?outcome.best.as_ref().and_then(|r| r.outcome.drag()),
            "optimization loop finished"
        );
        self.emit(LoopEvent::Finished { state, reason }).await;
        Ok(outcome)
    }

    async fn emit(&self, event: LoopEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver just means nobody is watching.
            let _ = events.send(event).await;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
