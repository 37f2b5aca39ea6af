//! Performing gate lookups over HTTP.

use std::future::Future;
use std::time::Duration;

use gatekeep_core::providers::{LookupError, LookupRequest, LookupResponse};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Something that can perform a gate's [`LookupRequest`].
///
/// Every failure (connect error, timeout, unreadable body) comes back as a
/// [`LookupError`]; the gate decides what it means.
pub trait Fetch {
    fn fetch(
        &self,
        request: &LookupRequest,
    ) -> impl Future<Output = Result<LookupResponse, LookupError>> + Send;
}

/// HTTP settings for [`HttpFetcher`]. Deserializes from the `[http]` table
/// of the CLI config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-lookup timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!("gatekeep/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// [`Fetch`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientError> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &LookupRequest) -> Result<LookupResponse, LookupError> {
        debug!(provider = %request.provider, url = %request.url, "sending lookup");

        let response = self
            .client
            .get(&request.url)
            .header(ACCEPT, request.accept.as_str())
            .send()
            .await
            .map_err(|e| LookupError::NetworkFailure(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| LookupError::NetworkFailure(e.to_string()))?;

        debug!(provider = %request.provider, status, bytes = body.len(), "lookup answered");
        Ok(LookupResponse {
            status,
            content_type,
            body,
        })
    }
}
