//! Run repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HistorySnapshot, IterationSummary, OptimizationRun, RunStatus};

/// Filter criteria for listing runs.
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub limit: Option<usize>,
}

/// Repository interface for run metadata and per-batch summaries.
#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn create(&self, run: &OptimizationRun) -> DomainResult<()>;

    async fn update(&self, run: &OptimizationRun) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<OptimizationRun>>;

    /// Look a run up by its `opt-...` session label.
    async fn find_by_session(&self, session: &str) -> DomainResult<Option<OptimizationRun>>;

    /// Most recent first.
    async fn list(&self, filter: RunFilter) -> DomainResult<Vec<OptimizationRun>>;

    async fn record_summary(&self, summary: &IterationSummary) -> DomainResult<()>;

    async fn summaries(&self, run_id: Uuid) -> DomainResult<Vec<IterationSummary>>;

    /// Read-only copy of a run's history.
    async fn load_history(&self, run_id: Uuid) -> DomainResult<HistorySnapshot>;
}
