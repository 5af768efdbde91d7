use std::time::Duration;

use crate::config::HttpSettings;
use crate::error::{PipelineError, Result};

/// Shared client for every provider: one connection pool, a hard per-request timeout.
pub fn build_client(settings: &HttpSettings) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_seconds))
        .user_agent(settings.user_agent.clone())
        .build()?;
    Ok(client)
}

/// Turn a non-success response into a `Provider` error carrying the body text.
pub async fn ensure_success(
    provider: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PipelineError::Provider {
        provider,
        status: status.as_u16(),
        body,
    })
}
