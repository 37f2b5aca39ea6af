//! Async gate driver.

use std::sync::atomic::{AtomicBool, Ordering};

use gatekeep_core::gate::{Gate, GateError, GateReport, GateStep, Navigator};
use gatekeep_core::trace::Trace;
use tracing::{debug, info, warn};

use crate::fetch::Fetch;

/// Drive `gate` to its verdict, performing each lookup with `fetcher`.
///
/// Lookups are awaited one at a time. A redirect is handed to `navigator`
/// and ends the run.
pub async fn run_gate<G, F>(
    gate: &mut G,
    fetcher: &F,
    navigator: &dyn Navigator,
) -> Result<GateReport, GateError>
where
    G: Gate + ?Sized,
    F: Fetch,
{
    let kind = gate.kind();
    let mut step = gate.start()?;

    loop {
        match step {
            GateStep::Fetch(request) => {
                let result = fetcher.fetch(&request).await;
                match &result {
                    Ok(response) => {
                        debug!(gate = %kind, provider = %request.provider, status = response.status, "lookup done")
                    }
                    Err(e) => {
                        debug!(gate = %kind, provider = %request.provider, error = %e, "lookup failed")
                    }
                }
                step = gate.deliver(result)?;
            }
            GateStep::Complete(verdict) => {
                info!(gate = %kind, reason = %verdict.reason, "visitor allowed");
                break;
            }
            GateStep::Redirect { url, verdict } => {
                info!(gate = %kind, reason = %verdict.reason, url = %url, "visitor blocked");
                navigator.navigate(&url);
                break;
            }
        }
    }

    let report = gate.report().ok_or(GateError::NotFinished(kind))?;
    for chain in exhausted_chains(&report.trace) {
        warn!(gate = %kind, chain = %chain, "every provider failed");
    }
    Ok(report)
}

/// Chains in `trace` that ran out of providers, once per exhausted pass.
/// A retried chain that failed on its first pass is listed even when the
/// retry succeeded.
pub fn exhausted_chains(trace: &Trace) -> Vec<String> {
    trace.exhausted().map(str::to_string).collect()
}

/// Forwards only the first redirect. A page can only be navigated away
/// from once.
pub struct FirstRedirect<'a> {
    inner: &'a dyn Navigator,
    fired: AtomicBool,
}

impl<'a> FirstRedirect<'a> {
    pub fn new(inner: &'a dyn Navigator) -> Self {
        Self {
            inner,
            fired: AtomicBool::new(false),
        }
    }

    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Navigator for FirstRedirect<'_> {
    fn navigate(&self, url: &str) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            self.inner.navigate(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::scripted::ScriptedFetcher;
    use gatekeep_core::capability::StaticEnvironment;
    use gatekeep_core::config::GateConfig;
    use gatekeep_core::gate::{AutomationGate, CountryGate, GateState};
    use gatekeep_core::providers::{LookupError, LookupRequest, LookupResponse};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Navigator for Recorder {
        fn navigate(&self, url: &str) {
            self.0.lock().unwrap().push(url.to_string());
        }
    }

    fn country_config() -> GateConfig {
        GateConfig {
            country_block: true,
            allowed_country: "CA".to_string(),
            redirect_url: "https://example.org/".to_string(),
            ..GateConfig::default()
        }
    }

    #[tokio::test]
    async fn test_run_gate_follows_chain_to_verdict() {
        let fetcher = ScriptedFetcher::new()
            .fail("https://api.ipify.org", "reset")
            .respond(
                "https://api64.ipify.org",
                LookupResponse::json(r#"{"ip":"203.0.113.4"}"#),
            )
            .respond("https://ipinfo.io/", LookupResponse::json(r#"{"country":"CA"}"#));
        let navigator = Recorder::default();
        let mut gate = CountryGate::new(country_config());

        let report = run_gate(&mut gate, &fetcher, &navigator).await.unwrap();
        assert!(report.verdict.allowed);
        assert_eq!(report.state, GateState::Complete);
        assert_eq!(fetcher.call_count(), 3);
        assert!(navigator.0.lock().unwrap().is_empty());
        assert!(exhausted_chains(&report.trace).is_empty());
    }

    #[tokio::test]
    async fn test_run_gate_redirects_once_and_stops() {
        let fetcher = ScriptedFetcher::new().respond(
            "https://api.ipify.org",
            LookupResponse::json(r#"{"ip":"203.0.113.4"}"#),
        );
        let navigator = Recorder::default();
        let mut gate = AutomationGate::new(
            GateConfig {
                redirect_url: "https://example.org/away".to_string(),
                ..GateConfig::default()
            },
            StaticEnvironment::browser("Go-http-client/1.1"),
        );

        let report = run_gate(&mut gate, &fetcher, &navigator).await.unwrap();
        assert!(!report.verdict.allowed);
        assert_eq!(
            *navigator.0.lock().unwrap(),
            vec!["https://example.org/away".to_string()]
        );
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_chains_reported() {
        let fetcher = ScriptedFetcher::new().respond(
            "https://api.ipify.org",
            LookupResponse::json(r#"{"ip":"203.0.113.4"}"#),
        );
        let mut gate = CountryGate::new(country_config());
        let report = run_gate(&mut gate, &fetcher, &Recorder::default())
            .await
            .unwrap();
        assert_eq!(exhausted_chains(&report.trace), vec!["geo".to_string()]);
    }

    /// Fails the first `failures` lookups, then answers every lookup with
    /// the same residential address and organization.
    struct FlakyFetcher {
        calls: AtomicUsize,
        failures: usize,
    }

    impl Fetch for FlakyFetcher {
        async fn fetch(&self, _request: &LookupRequest) -> Result<LookupResponse, LookupError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err(LookupError::NetworkFailure("offline".to_string()))
            } else {
                Ok(LookupResponse::json(
                    r#"{"ip":"203.0.113.9","org":"Deutsche Telekom AG"}"#,
                ))
            }
        }
    }

    #[tokio::test]
    async fn test_exhausted_first_pass_reported_after_successful_retry() {
        let fetcher = FlakyFetcher {
            calls: AtomicUsize::new(0),
            failures: 5,
        };
        let mut gate = AutomationGate::new(
            GateConfig::default(),
            StaticEnvironment::browser("Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0"),
        );

        let report = run_gate(&mut gate, &fetcher, &Recorder::default())
            .await
            .unwrap();
        assert!(report.verdict.allowed);
        assert_eq!(report.signals.ip_address.as_deref(), Some("203.0.113.9"));
        // Five failures, the retried address lookup, one reputation lookup.
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 7);
        assert_eq!(exhausted_chains(&report.trace), vec!["ip".to_string()]);
    }

    #[test]
    fn test_first_redirect_forwards_once() {
        let inner = Recorder::default();
        let once = FirstRedirect::new(&inner);
        assert!(!once.fired());
        once.navigate("https://a.example/");
        once.navigate("https://b.example/");
        assert!(once.fired());
        assert_eq!(*inner.0.lock().unwrap(), vec!["https://a.example/".to_string()]);
    }
}
