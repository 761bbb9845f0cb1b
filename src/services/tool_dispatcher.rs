//! Executes one [`ToolRequest`] against the search components.
//!
//! Every failure becomes a `ToolResponse::Error`; callers always get a
//! well-formed response object back.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::candidate_generator::CandidateGenerator;
use super::evaluator_gateway::EvaluatorGateway;
use crate::domain::errors::{Classify, DomainError, DomainResult};
use crate::domain::models::{
    is_feasible, HistorySnapshot, ParameterInput, RunConfig, ToolRequest, ToolResponse,
    MAX_BATCH_SIZE,
};
use crate::domain::ports::{GeometryGenerator, RunRepository};

pub struct ToolDispatcher {
    config: RunConfig,
    geometry: Arc<dyn GeometryGenerator>,
    gateway: EvaluatorGateway,
    runs: Option<Arc<dyn RunRepository>>,
}

impl ToolDispatcher {
    pub fn new(
        config: RunConfig,
        geometry: Arc<dyn GeometryGenerator>,
        gateway: EvaluatorGateway,
    ) -> Self {
        Self {
            config,
            geometry,
            gateway,
            runs: None,
        }
    }

    /// Enables `propose_next` against stored run histories.
    #[must_use]
    pub fn with_run_repository(mut self, runs: Arc<dyn RunRepository>) -> Self {
        self.runs = Some(runs);
        self
    }

    pub async fn dispatch(&self, request: ToolRequest) -> ToolResponse {
        let operation = request.operation();
        match self.handle(request).await {
            Ok(response) => {
                info!(operation, "tool request handled");
                response
            }
            Err(err) => {
                warn!(operation, error = %err, "tool request failed");
                let kind = match &err {
                    DomainError::RunNotFound(_) => "run-not-found",
                    other => other.failure_kind().map_or("internal-error", |k| k.as_str()),
                };
                ToolResponse::error(kind, err.to_string())
            }
        }
    }

    async fn handle(&self, request: ToolRequest) -> DomainResult<ToolResponse> {
        let space = &self.config.parameter_space;
        match request {
            ToolRequest::Generate { parameters } => {
                let parameters = parameters.into_parameters(space)?;
                Ok(ToolResponse::Generate {
                    geometry: self.geometry.generate(&parameters),
                })
            }
            ToolRequest::Evaluate {
                parameters,
                reynolds,
                timeout_ms,
            } => {
                let parameters = parameters.into_parameters(space)?;
                if let Some(r) = reynolds {
                    if !r.is_finite() || r <= 0.0 {
                        return Err(DomainError::InvalidConfiguration(format!(
                            "reynolds must be positive, got {r}"
                        )));
                    }
                }
                let geometry = self.geometry.generate(&parameters);
                let gateway = reynolds.map_or_else(|| self.gateway.clone(), |r| self.gateway.at_reynolds(r));
                let timeout = Duration::from_millis(
                    timeout_ms.unwrap_or(self.config.evaluation_timeout_ms).max(1),
                );
                let outcome = gateway.evaluate(&geometry, timeout).await;
                Ok(ToolResponse::Evaluate {
                    geometry_id: geometry.id().to_string(),
                    feasible: is_feasible(&self.config.constraints, &outcome),
                    outcome,
                })
            }
            ToolRequest::ProposeNext {
                run_id,
                batch_size,
                seed,
            } => {
                if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
                    return Err(DomainError::InvalidConfiguration(format!(
                        "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
                    )));
                }
                let (config, history) = match run_id {
                    Some(id) => {
                        let runs = self.runs.as_ref().ok_or_else(|| {
                            DomainError::InvalidConfiguration(
                                "propose_next with run_id needs a database".to_string(),
                            )
                        })?;
                        let run = runs
                            .get(id)
                            .await?
                            .ok_or_else(|| DomainError::RunNotFound(id.to_string()))?;
                        (run.config, runs.load_history(id).await?)
                    }
                    None => (self.config.clone(), HistorySnapshot::empty()),
                };
                let mut generator_config = config;
                if let Some(seed) = seed {
                    generator_config.seed = seed;
                }
                let plan = CandidateGenerator::from_config(&generator_config).plan_batch(
                    &history,
                    batch_size,
                    &generator_config.parameter_space,
                );
                Ok(ToolResponse::ProposeNext {
                    candidates: plan.candidates.into_iter().map(ParameterInput::from).collect(),
                    explore_count: plan.explore_count,
                    exploit_count: plan.exploit_count,
                    trust_radius: plan.trust_radius,
                })
            }
        }
    }
}
