//! History store kept in a `Vec` behind a mutex.

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{HistoryRecord, HistorySnapshot};
use crate::domain::ports::HistoryStore;

pub struct InMemoryHistoryStore {
    run_id: Uuid,
    records: Mutex<Vec<HistoryRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Start from previously committed records, e.g. when resuming a run.
    pub fn with_records(run_id: Uuid, records: Vec<HistoryRecord>) -> Self {
        Self {
            run_id,
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    fn run_id(&self) -> Uuid {
        self.run_id
    }

    async fn append(&self, record: HistoryRecord) -> DomainResult<()> {
        if record.run_id != self.run_id {
            return Err(DomainError::InvalidConfiguration(format!(
                "record belongs to run {}, store is scoped to {}",
                record.run_id, self.run_id
            )));
        }
        let mut records = self.records.lock().await;
        let last = records.last().map(|r| r.iteration);
        if last.is_some_and(|last| record.iteration <= last) {
            return Err(DomainError::IterationConflict {
                attempted: record.iteration,
                last,
            });
        }
        records.push(record);
        Ok(())
    }

    async fn all_records(&self) -> DomainResult<HistorySnapshot> {
        Ok(HistorySnapshot::new(self.records.lock().await.clone()))
    }
}
