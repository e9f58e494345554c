//! Shared plumbing for calls to the two upstream providers.

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use super::error::WorkflowError;
use super::metrics::record_upstream_call;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Invalid upstream URL: {0}")]
    Url(String),
}

impl From<UpstreamError> for WorkflowError {
    fn from(err: UpstreamError) -> Self {
        WorkflowError::UpstreamUnavailable(err.to_string())
    }
}

/// HTTP client with the bounded per-request timeout every upstream call uses.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("task-bridge/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// `base` with `segments` appended as individually escaped path segments.
pub fn join_url(base: &str, segments: &[&str]) -> Result<Url, UpstreamError> {
    let mut url = Url::parse(base).map_err(|e| UpstreamError::Url(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| UpstreamError::Url(format!("{} cannot be a base", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Check the status and decode a JSON body; non-2xx bodies are kept for the log.
pub async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
}

/// Count the outcome of one upstream call and pass the result through.
pub fn observe<T>(
    upstream: &'static str,
    result: Result<T, UpstreamError>,
) -> Result<T, UpstreamError> {
    record_upstream_call(upstream, if result.is_ok() { "ok" } else { "error" });
    result
}
