//! History store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Constraint, HistoryRecord, HistorySnapshot};

/// Append-only ledger of one run's evaluations.
///
/// Handles are run-scoped. `append` is atomic and rejects any record whose
/// iteration is not strictly greater than the last committed one with
/// [`DomainError::IterationConflict`](crate::domain::errors::DomainError::IterationConflict).
/// A backend that cannot be reached reports
/// [`DomainError::StoreUnavailable`](crate::domain::errors::DomainError::StoreUnavailable).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    fn run_id(&self) -> Uuid;

    async fn append(&self, record: HistoryRecord) -> DomainResult<()>;

    /// Every committed record, ordered by iteration.
    async fn all_records(&self) -> DomainResult<HistorySnapshot>;

    async fn best_feasible(&self, constraints: &[Constraint]) -> DomainResult<Option<HistoryRecord>> {
        let snapshot = self.all_records().await?;
        Ok(snapshot.best_feasible(constraints).cloned())
    }

    async fn count(&self) -> DomainResult<usize> {
        Ok(self.all_records().await?.len())
    }
}
