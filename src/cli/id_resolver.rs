//! Run lookup for CLI commands.
//!
//! A run can be named by its full id, any unique id prefix (like a git
//! short hash), or its `opt-...` session label.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::SqliteRunRepository;
use crate::domain::models::OptimizationRun;
use crate::domain::ports::RunRepository;

pub async fn resolve_run(pool: &SqlitePool, ident: &str) -> Result<OptimizationRun> {
    let repo = SqliteRunRepository::new(pool.clone());
    if ident.starts_with("opt-") {
        return match repo.find_by_session(ident).await? {
            Some(run) => Ok(run),
            None => bail!("No run found with session '{ident}'"),
        };
    }
    let id = resolve_run_id(pool, ident).await?;
    match repo.get(id).await? {
        Some(run) => Ok(run),
        None => bail!("No run found matching '{ident}'"),
    }
}

async fn resolve_run_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(prefix) {
        return Ok(uuid);
    }
    validate_prefix(prefix)?;

    let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM optimization_runs WHERE id LIKE ?")
        .bind(format!("{prefix}%"))
        .fetch_all(pool)
        .await?;

    match rows.as_slice() {
        [] => bail!("No run found matching '{prefix}'"),
        [(id,)] => Ok(Uuid::parse_str(id)?),
        many => {
            let mut msg = format!("Ambiguous prefix '{prefix}': matches {} runs:", many.len());
            for (id,) in many {
                msg.push_str(&format!("\n  {id}"));
            }
            bail!("{msg}")
        }
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        bail!("Run id must not be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!("Invalid run id '{prefix}': expected hex characters, dashes, or an opt-... session label");
    }
    Ok(())
}
