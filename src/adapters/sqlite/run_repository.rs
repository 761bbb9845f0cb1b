//! SQLite implementation of the RunRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::history_store::load_records;
use super::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    HistorySnapshot, IterationSummary, LoopState, OptimizationRun, RunConfig, RunStatus,
};
use crate::domain::ports::{RunFilter, RunRepository};

const RUN_COLUMNS: &str =
    "id, session, config, status, state, reason, created_at, updated_at, completed_at";

#[derive(Clone)]
pub struct SqliteRunRepository {
    pool: SqlitePool,
}

impl SqliteRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRepository for SqliteRunRepository {
    async fn create(&self, run: &OptimizationRun) -> DomainResult<()> {
        let config_json = serde_json::to_string(&run.config)?;

        sqlx::query(
            r#"INSERT INTO optimization_runs (id, session, config, status, state, reason, created_at, updated_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run.id.to_string())
        .bind(&run.session)
        .bind(&config_json)
        .bind(run.status.as_str())
        .bind(run.state.as_str())
        .bind(run.reason.as_deref())
        .bind(run.created_at.to_rfc3339())
        .bind(run.updated_at.to_rfc3339())
        .bind(run.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, run: &OptimizationRun) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE optimization_runs SET status = ?, state = ?, reason = ?, updated_at = ?, completed_at = ?
               WHERE id = ?"#,
        )
        .bind(run.status.as_str())
        .bind(run.state.as_str())
        .bind(run.reason.as_deref())
        .bind(run.updated_at.to_rfc3339())
        .bind(run.completed_at.map(|t| t.to_rfc3339()))
        .bind(run.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::RunNotFound(run.id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<OptimizationRun>> {
        let row: Option<RunRow> =
            sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM optimization_runs WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_session(&self, session: &str) -> DomainResult<Option<OptimizationRun>> {
        let row: Option<RunRow> =
            sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM optimization_runs WHERE session = ?"))
                .bind(session)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: RunFilter) -> DomainResult<Vec<OptimizationRun>> {
        let mut query = format!("SELECT {RUN_COLUMNS} FROM optimization_runs WHERE 1=1");
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        query.push_str(" ORDER BY created_at DESC, rowid DESC");
        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, RunRow>(&query);
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn record_summary(&self, summary: &IterationSummary) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO iteration_summaries (run_id, batch, evaluated, feasible, failures,
               best_drag, best_geometry_id, explore_count, exploit_count, trust_radius, recorded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(summary.run_id.to_string())
        .bind(i64::from(summary.batch))
        .bind(summary.evaluated as i64)
        .bind(summary.feasible as i64)
        .bind(summary.failures as i64)
        .bind(summary.best_drag)
        .bind(summary.best_geometry_id.as_deref())
        .bind(summary.explore_count as i64)
        .bind(summary.exploit_count as i64)
        .bind(summary.trust_radius)
        .bind(summary.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn summaries(&self, run_id: Uuid) -> DomainResult<Vec<IterationSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"SELECT run_id, batch, evaluated, feasible, failures, best_drag, best_geometry_id,
               explore_count, exploit_count, trust_radius, recorded_at
               FROM iteration_summaries WHERE run_id = ? ORDER BY batch ASC"#,
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn load_history(&self, run_id: Uuid) -> DomainResult<HistorySnapshot> {
        load_records(&self.pool, run_id).await
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    session: String,
    config: String,
    status: String,
    state: String,
    reason: Option<String>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl TryFrom<RunRow> for OptimizationRun {
    type Error = DomainError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let config: RunConfig = serde_json::from_str(&row.config)?;
        let status = RunStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("unknown run status: {}", row.status)))?;
        let state = LoopState::from_str(&row.state)
            .ok_or_else(|| DomainError::SerializationError(format!("unknown loop state: {}", row.state)))?;

        Ok(OptimizationRun {
            id: parse_uuid(&row.id)?,
            session: row.session,
            config,
            status,
            state,
            reason: row.reason,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    run_id: String,
    batch: i64,
    evaluated: i64,
    feasible: i64,
    failures: i64,
    best_drag: Option<f64>,
    best_geometry_id: Option<String>,
    explore_count: i64,
    exploit_count: i64,
    trust_radius: Option<f64>,
    recorded_at: String,
}

impl TryFrom<SummaryRow> for IterationSummary {
    type Error = DomainError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        Ok(IterationSummary {
            run_id: parse_uuid(&row.run_id)?,
            batch: row.batch as u32,
            evaluated: row.evaluated as usize,
            feasible: row.feasible as usize,
            failures: row.failures as usize,
            best_drag: row.best_drag,
            best_geometry_id: row.best_geometry_id,
            explore_count: row.explore_count as usize,
            exploit_count: row.exploit_count as usize,
            trust_radius: row.trust_radius,
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}
