use std::sync::Mutex;

use gatekeep_core::providers::{LookupError, LookupRequest, LookupResponse};

use crate::fetch::Fetch;

/// Async lookup double. Responses are keyed by URL prefix; anything
/// unscripted fails like an unreachable host.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: Vec<(String, Result<LookupResponse, LookupError>)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url_prefix: impl Into<String>, response: LookupResponse) -> Self {
        self.scripts.push((url_prefix.into(), Ok(response)));
        self
    }

    pub fn fail(mut self, url_prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        self.scripts.push((
            url_prefix.into(),
            Err(LookupError::NetworkFailure(reason.into())),
        ));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

impl Fetch for ScriptedFetcher {
    async fn fetch(&self, request: &LookupRequest) -> Result<LookupResponse, LookupError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.url.clone());
        }
        tokio::task::yield_now().await;
        self.scripts
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| {
                Err(LookupError::NetworkFailure(format!(
                    "unreachable: {}",
                    request.url
                )))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> LookupRequest {
        LookupRequest {
            provider: "p".to_string(),
            url: url.to_string(),
            accept: "application/json".to_string(),
        }
    }

    #[tokio::test]
    async fn test_scripted_fetcher_records_calls() {
        let fetcher = ScriptedFetcher::new()
            .respond("https://a.test/", LookupResponse::text("ok"))
            .fail("https://b.test/", "reset");

        assert!(fetcher.fetch(&request("https://a.test/x")).await.is_ok());
        assert!(fetcher.fetch(&request("https://b.test/x")).await.is_err());
        assert!(fetcher.fetch(&request("https://c.test/x")).await.is_err());
        assert_eq!(fetcher.call_count(), 3);
        assert_eq!(fetcher.calls()[2], "https://c.test/x");
    }
}
