//! Remote CFD service reached over HTTP.
//!
//! Protocol: `POST {endpoint}` with a JSON [`SolveRequest`], answered by a
//! JSON [`SolverResponse`].

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{CfdSolver, SolveRequest, SolverError, SolverResponse};

#[derive(Clone)]
pub struct HttpCfdSolver {
    client: Client,
    endpoint: String,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpCfdSolver {
    /// `requests_per_second == 0` disables client-side rate limiting.
    pub fn new(endpoint: impl Into<String>, requests_per_second: u32, request_timeout: Duration) -> DomainResult<Self> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint)
            .map_err(|e| DomainError::InvalidConfiguration(format!("invalid solver endpoint {endpoint}: {e}")))?;

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DomainError::InvalidConfiguration(format!("failed to create HTTP client: {e}")))?;

        let limiter = NonZeroU32::new(requests_per_second)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(Self {
            client,
            endpoint,
            limiter,
        })
    }
}

fn classify_status(status: StatusCode, body: &str) -> SolverError {
    let detail = format!("solver returned {status}: {}", body.chars().take(200).collect::<String>());
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SolverError::Timeout(detail),
        _ => SolverError::Infrastructure(detail),
    }
}

fn classify_transport(err: &reqwest::Error) -> SolverError {
    if err.is_timeout() {
        SolverError::Timeout(err.to_string())
    } else {
        SolverError::Infrastructure(err.to_string())
    }
}

#[async_trait]
impl CfdSolver for HttpCfdSolver {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn solve(&self, request: SolveRequest) -> Result<SolverResponse, SolverError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        debug!(endpoint = %self.endpoint, geometry_id = %request.geometry_id, "dispatching solve");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .json::<SolverResponse>()
            .await
            .map_err(|e| SolverError::Infrastructure(format!("malformed solver response: {e}")))
    }
}
