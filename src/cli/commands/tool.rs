//! Implementation of the `foilopt tool` command.
//!
//! Reads one JSON `ToolRequest` and always prints one JSON `ToolResponse`,
//! including for malformed input.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::AsyncReadExt;
use tracing::warn;

use super::{build_gateway, open_database};
use crate::adapters::geometry::NacaGeometryGenerator;
use crate::adapters::sqlite::SqliteRunRepository;
use crate::domain::models::{Config, ToolRequest, ToolResponse};
use crate::services::ToolDispatcher;

#[derive(Args, Debug)]
pub struct ToolArgs {
    /// Read the request from this file instead of stdin
    #[arg(long, short)]
    pub file: Option<PathBuf>,
}

pub async fn execute(args: ToolArgs, config: &Config) -> Result<()> {
    let raw = match &args.file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read request from stdin")?;
            buf
        }
    };

    let response = match parse_request(&raw) {
        Ok(request) => dispatcher(config).await?.dispatch(request).await,
        Err(response) => response,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize response")?
    );
    Ok(())
}

pub fn parse_request(raw: &str) -> Result<ToolRequest, ToolResponse> {
    serde_json::from_str(raw).map_err(|e| ToolResponse::error("invalid-request", e.to_string()))
}

async fn dispatcher(config: &Config) -> Result<ToolDispatcher> {
    let gateway = build_gateway(&config.evaluator, &config.search)?;
    let dispatcher = ToolDispatcher::new(
        config.search.clone(),
        Arc::new(NacaGeometryGenerator::default()),
        gateway,
    );
    if !Path::new(&config.database.path).exists() {
        return Ok(dispatcher);
    }
    match open_database(config).await {
        Ok(pool) => Ok(dispatcher.with_run_repository(Arc::new(SqliteRunRepository::new(pool)))),
        Err(err) => {
            warn!(error = %err, "database unavailable; run-scoped requests will fail");
            Ok(dispatcher)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_request() {
        let request = parse_request(
            r#"{"operation":"propose_next","batch_size":4,"seed":3}"#,
        )
        .unwrap();
        assert_eq!(request.operation(), "propose_next");
    }

    #[test]
    fn test_malformed_request_becomes_error_response() {
        let response = parse_request(r#"{"operation":"launch"}"#).unwrap_err();
        match response {
            ToolResponse::Error { kind, .. } => assert_eq!(kind, "invalid-request"),
            other => panic!("expected error response, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_parameter_fields_are_rejected() {
        let raw = r#"{"operation":"generate","parameters":{"thickness":0.12,"max_camber":0.02,"camber_position":0.4,"angle_of_attack":2.0,"twist":1.0}}"#;
        assert!(parse_request(raw).is_err());
    }
}
