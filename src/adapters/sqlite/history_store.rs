//! SQLite history store. One row per evaluation, committed in its own
//! transaction.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AeroCoefficients, DesignParameters, EvaluationOutcome, FailureReason, HistoryRecord,
    HistorySnapshot,
};
use crate::domain::ports::HistoryStore;

const SELECT_RECORDS: &str = "SELECT run_id, iteration, batch, thickness, max_camber, camber_position, angle_of_attack, \
     geometry_id, lift, drag, converged, wall_clock_ms, attempts, failure, detail, recorded_at \
     FROM history_records WHERE run_id = ? ORDER BY iteration ASC";

#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
    run_id: Uuid,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool, run_id: Uuid) -> Self {
        Self { pool, run_id }
    }
}

/// Read every record of `run_id` from `pool`.
pub(crate) async fn load_records(pool: &SqlitePool, run_id: Uuid) -> DomainResult<HistorySnapshot> {
    let rows: Vec<HistoryRow> = sqlx::query_as(SELECT_RECORDS)
        .bind(run_id.to_string())
        .fetch_all(pool)
        .await
        .map_err(store_error)?;
    let records = rows
        .into_iter()
        .map(HistoryRecord::try_from)
        .collect::<DomainResult<Vec<_>>>()?;
    Ok(HistorySnapshot::new(records))
}

/// Lost connections and lock contention are transient; everything else is not.
fn store_error(err: sqlx::Error) -> DomainError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DomainError::StoreUnavailable(err.to_string())
        }
        sqlx::Error::Database(db) => {
            let message = db.message().to_ascii_lowercase();
            if message.contains("locked") || message.contains("busy") {
                DomainError::StoreUnavailable(err.to_string())
            } else {
                DomainError::DatabaseError(err.to_string())
            }
        }
        _ => DomainError::DatabaseError(err.to_string()),
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
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
        let iteration = i64::try_from(record.iteration)
            .map_err(|_| DomainError::SerializationError("iteration out of range".to_string()))?;

        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let (last,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(iteration) FROM history_records WHERE run_id = ?")
                .bind(self.run_id.to_string())
                .fetch_one(&mut *tx)
                .await
                .map_err(store_error)?;
        if last.is_some_and(|last| iteration <= last) {
            return Err(DomainError::IterationConflict {
                attempted: record.iteration,
                last: last.map(|l| l as u64),
            });
        }

        let params = record.parameters;
        let outcome = &record.outcome;
        let result = sqlx::query(
            r#"INSERT INTO history_records (run_id, iteration, batch, thickness, max_camber, camber_position,
               angle_of_attack, geometry_id, lift, drag, converged, wall_clock_ms, attempts, failure, detail, recorded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.run_id.to_string())
        .bind(iteration)
        .bind(i64::from(record.batch))
        .bind(params.thickness())
        .bind(params.max_camber())
        .bind(params.camber_position())
        .bind(params.angle_of_attack())
        .bind(&record.geometry_id)
        .bind(outcome.lift())
        .bind(outcome.drag())
        .bind(outcome.converged)
        .bind(outcome.wall_clock_ms as i64)
        .bind(i64::from(outcome.attempts))
        .bind(outcome.failure.map(FailureReason::as_str))
        .bind(outcome.detail.as_deref())
        .bind(record.recorded_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        if let Err(err) = result {
            let unique = err
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            return Err(if unique {
                DomainError::IterationConflict {
                    attempted: record.iteration,
                    last: last.map(|l| l as u64),
                }
            } else {
                store_error(err)
            });
        }

        tx.commit().await.map_err(store_error)?;
        debug!(run_id = %self.run_id, iteration = record.iteration, "history record committed");
        Ok(())
    }

    async fn all_records(&self) -> DomainResult<HistorySnapshot> {
        load_records(&self.pool, self.run_id).await
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    run_id: String,
    iteration: i64,
    batch: i64,
    thickness: f64,
    max_camber: f64,
    camber_position: f64,
    angle_of_attack: f64,
    geometry_id: String,
    lift: Option<f64>,
    drag: Option<f64>,
    converged: bool,
    wall_clock_ms: i64,
    attempts: i64,
    failure: Option<String>,
    detail: Option<String>,
    recorded_at: String,
}

impl TryFrom<HistoryRow> for HistoryRecord {
    type Error = DomainError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let failure = row
            .failure
            .as_deref()
            .map(|s| {
                FailureReason::from_str(s)
                    .ok_or_else(|| DomainError::SerializationError(format!("unknown failure reason: {s}")))
            })
            .transpose()?;
        let coefficients = match (row.lift, row.drag) {
            (Some(lift), Some(drag)) => Some(AeroCoefficients::new(lift, drag)),
            _ => None,
        };

        Ok(HistoryRecord {
            run_id: parse_uuid(&row.run_id)?,
            iteration: row.iteration as u64,
            batch: row.batch as u32,
            parameters: DesignParameters::from_array_unchecked([
                row.thickness,
                row.max_camber,
                row.camber_position,
                row.angle_of_attack,
            ]),
            geometry_id: row.geometry_id,
            outcome: EvaluationOutcome {
                coefficients,
                converged: row.converged,
                wall_clock_ms: row.wall_clock_ms.max(0) as u64,
                attempts: row.attempts.max(0) as u32,
                failure,
                detail: row.detail,
            },
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::ParameterSpace;
    use chrono::{TimeZone, Utc};

    fn record(run_id: Uuid, iteration: u64, outcome: EvaluationOutcome) -> HistoryRecord {
        HistoryRecord {
            run_id,
            iteration,
            batch: (iteration as u32 - 1) / 2,
            parameters: DesignParameters::new(&ParameterSpace::default(), [0.12, 0.02, 0.4, 2.0])
                .unwrap(),
            geometry_id: format!("NACA2412_a2.{iteration}"),
            outcome,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_records_round_trip_including_failures() {
        let pool = create_migrated_test_pool().await.unwrap();
        let run_id = Uuid::new_v4();
        let store = SqliteHistoryStore::new(pool, run_id);

        let ok = record(run_id, 1, EvaluationOutcome::success(AeroCoefficients::new(0.31, 0.014), 12, 1));
        let diverged = record(
            run_id,
            2,
            EvaluationOutcome::diverged(Some(AeroCoefficients::new(0.2, 0.05)), 40, 1, "not converged"),
        );
        let timeout = record(run_id, 3, EvaluationOutcome::failed(FailureReason::Timeout, 900, 3, "no response"));
        for r in [&ok, &diverged, &timeout] {
            store.append(r.clone()).await.unwrap();
        }

        let snapshot = store.all_records().await.unwrap();
        assert_eq!(snapshot.records(), &[ok, diverged, timeout]);
    }

    #[tokio::test]
    async fn test_stale_iteration_is_rejected() {
        let pool = create_migrated_test_pool().await.unwrap();
        let run_id = Uuid::new_v4();
        let store = SqliteHistoryStore::new(pool, run_id);
        let outcome = EvaluationOutcome::success(AeroCoefficients::new(0.31, 0.014), 1, 1);

        store.append(record(run_id, 2, outcome.clone())).await.unwrap();
        let err = store.append(record(run_id, 1, outcome)).await.unwrap_err();
        assert!(matches!(err, DomainError::IterationConflict { attempted: 1, last: Some(2) }));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let pool = create_migrated_test_pool().await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let outcome = EvaluationOutcome::success(AeroCoefficients::new(0.31, 0.014), 1, 1);
        SqliteHistoryStore::new(pool.clone(), a)
            .append(record(a, 1, outcome.clone()))
            .await
            .unwrap();
        SqliteHistoryStore::new(pool.clone(), b)
            .append(record(b, 1, outcome))
            .await
            .unwrap();
        assert_eq!(load_records(&pool, a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_reports_store_unavailable() {
        let pool = create_migrated_test_pool().await.unwrap();
        let run_id = Uuid::new_v4();
        let store = SqliteHistoryStore::new(pool.clone(), run_id);
        pool.close().await;
        let err = store.all_records().await.unwrap_err();
        assert!(matches!(err, DomainError::StoreUnavailable(_)));
    }
}
