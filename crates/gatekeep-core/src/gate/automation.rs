//! Automation ("bot") gate.
//!
//! Check order, each step short-circuiting:
//! 1. switched off → allow without any lookup
//! 2. resolve the visitor address (failure tolerated)
//! 3. required user agent missing → block
//! 4. user agent matches an automation signature → block
//! 5. capability probe fails → block
//! 6. reputation (when VPN or proxy/RDP blocking is on): re-resolve a
//!    missing address, classify the organization, hosting check before VPN
//!    check; no classification → allow
//! 7. allow

use std::mem;

use crate::capability::{self, Environment};
use crate::config::GateConfig;
use crate::ip;
use crate::providers::{LookupError, LookupResponse, Progress, Resolution};
use crate::reputation;
use crate::signature;

use super::{Gate, GateError, GateKind, GateReport, GateState, GateStep, Run};

#[derive(Debug)]
enum Stage {
    Idle,
    ResolvingIp { resolution: Resolution, retry: bool },
    ResolvingOrganization { resolution: Resolution },
    Finished,
}

pub struct AutomationGate<E: Environment> {
    config: GateConfig,
    env: E,
    run: Run,
    stage: Stage,
}

impl<E: Environment> AutomationGate<E> {
    pub fn new(config: GateConfig, env: E) -> Self {
        let run = Run::new(GateKind::Automation, &config.redirect_url);
        Self {
            config,
            env,
            run,
            stage: Stage::Idle,
        }
    }

    pub fn environment(&self) -> &E {
        &self.env
    }

    fn begin_ip(&mut self, retry: bool) -> GateStep {
        let resolution = Resolution::new(ip::chain(), "");
        match resolution.request() {
            Some(request) => {
                self.stage = Stage::ResolvingIp { resolution, retry };
                GateStep::Fetch(request)
            }
            None => self.ip_resolved(None, retry),
        }
    }

    fn ip_resolved(&mut self, address: Option<String>, retry: bool) -> GateStep {
        self.run.signals.ip_address = address;
        if retry {
            self.begin_reputation()
        } else {
            self.local_checks()
        }
    }

    fn local_checks(&mut self) -> GateStep {
        let user_agent = self.env.user_agent();
        self.run.signals.identity = Some(user_agent.clone());

        if self.config.require_user_agent {
            let present = !user_agent.is_empty();
            self.run.check("user_agent_present", present, None);
            if !present {
                return self.finish_block("no user agent");
            }
        }

        if self.config.block_ua {
            let hit = signature::match_signature(&user_agent);
            self.run
                .check("signature", hit.is_none(), hit.map(str::to_string));
            if let Some(token) = hit {
                return self.finish_block(format!("suspicious user agent: {token}"));
            }
        }

        let probed = capability::probe(&self.env);
        self.run.check(
            "capability",
            probed.is_ok(),
            probed.as_ref().err().map(|e| e.to_string()),
        );
        if let Err(e) = probed {
            return self.finish_block(e.to_string());
        }

        if !self.config.reputation_enabled() {
            return self.finish_allow("checks passed");
        }

        let known = self
            .run
            .signals
            .ip_address
            .as_deref()
            .is_some_and(ip::is_resolved);
        if known {
            self.begin_reputation()
        } else {
            self.begin_ip(true)
        }
    }

    fn begin_reputation(&mut self) -> GateStep {
        let Some(address) = self
            .run
            .signals
            .ip_address
            .clone()
            .filter(|a| ip::is_resolved(a))
        else {
            self.run.check(
                "reputation",
                true,
                Some("address unresolved".to_string()),
            );
            return self.finish_allow("checks passed; address unresolved");
        };

        let resolution = Resolution::new(reputation::chain(), address);
        match resolution.request() {
            Some(request) => {
                self.stage = Stage::ResolvingOrganization { resolution };
                GateStep::Fetch(request)
            }
            None => self.organization_resolved(None),
        }
    }

    fn organization_resolved(&mut self, organization: Option<String>) -> GateStep {
        let classification = match reputation::classify_resolved(organization.as_deref()) {
            Ok(c) => c,
            Err(unavailable) => {
                self.run
                    .check("reputation", true, Some(unavailable.to_string()));
                return self.finish_allow("checks passed; classification unavailable");
            }
        };
        self.run.signals.organization = Some(classification.organization.clone());

        if self.config.block_isp {
            if let Some(token) = &classification.hosting_match {
                self.run.check("hosting", false, Some(token.clone()));
                return self.finish_block(format!("hosting provider: {token}"));
            }
            self.run.check("hosting", true, None);
        }

        if self.config.block_vpn {
            if let Some(token) = &classification.vpn_match {
                self.run.check("vpn", false, Some(token.clone()));
                return self.finish_block(format!("vpn/proxy detected: {token}"));
            }
            self.run.check("vpn", true, None);
        }

        self.finish_allow("checks passed")
    }

    fn finish_allow(&mut self, reason: impl Into<String>) -> GateStep {
        self.stage = Stage::Finished;
        self.run.allow(reason)
    }

    fn finish_block(&mut self, reason: impl Into<String>) -> GateStep {
        self.stage = Stage::Finished;
        self.run.block(reason)
    }
}

impl<E: Environment> Gate for AutomationGate<E> {
    fn kind(&self) -> GateKind {
        GateKind::Automation
    }

    fn state(&self) -> GateState {
        self.run.state
    }

    fn start(&mut self) -> Result<GateStep, GateError> {
        self.run.ensure_init()?;

        if !self.config.bot_protect {
            self.run.transition(GateState::Disabled);
            return Ok(self.finish_allow("bot protection disabled"));
        }

        self.run.transition(GateState::Running);
        Ok(self.begin_ip(false))
    }

    fn deliver(
        &mut self,
        result: Result<LookupResponse, LookupError>,
    ) -> Result<GateStep, GateError> {
        match mem::replace(&mut self.stage, Stage::Finished) {
            Stage::ResolvingIp {
                mut resolution,
                retry,
            } => match resolution.deliver(result) {
                Progress::Next(request) => {
                    self.stage = Stage::ResolvingIp { resolution, retry };
                    Ok(GateStep::Fetch(request))
                }
                Progress::Resolved(address) => {
                    self.run.trace.record_attempts(resolution.into_attempts());
                    Ok(self.ip_resolved(Some(address), retry))
                }
                Progress::Exhausted => {
                    self.run.trace.record_exhausted(resolution);
                    Ok(self.ip_resolved(None, retry))
                }
            },
            Stage::ResolvingOrganization { mut resolution } => {
                match resolution.deliver(result) {
                    Progress::Next(request) => {
                        self.stage = Stage::ResolvingOrganization { resolution };
                        Ok(GateStep::Fetch(request))
                    }
                    Progress::Resolved(organization) => {
                        self.run.trace.record_attempts(resolution.into_attempts());
                        Ok(self.organization_resolved(Some(organization)))
                    }
                    Progress::Exhausted => {
                        self.run.trace.record_exhausted(resolution);
                        Ok(self.organization_resolved(None))
                    }
                }
            }
            other => {
                self.stage = other;
                Err(GateError::NotWaiting(GateKind::Automation))
            }
        }
    }

    fn report(&self) -> Option<GateReport> {
        self.run.report()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::capability::{CanvasProbe, StaticEnvironment};
    use crate::gate::{run_blocking, Navigator};
    use crate::providers::ScriptedLookups;
    use crate::trace::TraceEvent;

    const UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
    const REDIRECT: &str = "https://example.org/elsewhere";

    #[derive(Default)]
    struct RecordingNavigator {
        visits: RefCell<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, url: &str) {
            self.visits.borrow_mut().push(url.to_string());
        }
    }

    fn config() -> GateConfig {
        GateConfig {
            redirect_url: REDIRECT.to_string(),
            ..GateConfig::default()
        }
    }

    fn ip_ok() -> ScriptedLookups {
        ScriptedLookups::new().respond(
            "https://api.ipify.org",
            LookupResponse::json(r#"{"ip":"203.0.113.50"}"#),
        )
    }

    fn run(
        config: GateConfig,
        env: StaticEnvironment,
        lookups: &ScriptedLookups,
    ) -> (GateReport, RecordingNavigator) {
        let navigator = RecordingNavigator::default();
        let mut gate = AutomationGate::new(config, env);
        let report = run_blocking(&mut gate, |r| lookups.lookup(r), &navigator).unwrap();
        (report, navigator)
    }

    #[test]
    fn test_disabled_allows_without_lookups() {
        let lookups = ScriptedLookups::new();
        let mut config = config();
        config.bot_protect = false;
        let (report, nav) = run(config, StaticEnvironment::browser(""), &lookups);
        assert!(report.verdict.allowed);
        assert_eq!(report.state, GateState::Complete);
        assert_eq!(lookups.call_count(), 0);
        assert!(nav.visits.borrow().is_empty());
    }

    #[test]
    fn test_clean_residential_visitor_allowed() {
        let lookups = ip_ok().respond(
            "https://ipapi.co/203.0.113.50/json/",
            LookupResponse::json(r#"{"org":"AS7922 Comcast Cable Communications"}"#),
        );
        let (report, nav) = run(config(), StaticEnvironment::browser(UA), &lookups);
        assert!(report.verdict.allowed, "{:?}", report.verdict);
        assert_eq!(report.state, GateState::Complete);
        assert_eq!(report.signals.ip_address.as_deref(), Some("203.0.113.50"));
        assert_eq!(
            report.signals.organization.as_deref(),
            Some("AS7922 Comcast Cable Communications")
        );
        assert!(nav.visits.borrow().is_empty());
        assert_eq!(lookups.call_count(), 2);
    }

    #[test]
    fn test_missing_user_agent_blocks() {
        let lookups = ip_ok();
        let (report, nav) = run(config(), StaticEnvironment::browser(""), &lookups);
        assert!(!report.verdict.allowed);
        assert_eq!(report.verdict.reason, "no user agent");
        assert_eq!(report.state, GateState::Block);
        assert_eq!(*nav.visits.borrow(), vec![REDIRECT.to_string()]);
    }

    #[test]
    fn test_missing_user_agent_still_fails_capability_probe_when_not_required() {
        let lookups = ip_ok();
        let mut config = config();
        config.require_user_agent = false;
        let (report, _) = run(config, StaticEnvironment::browser(""), &lookups);
        assert!(!report.verdict.allowed);
        assert_eq!(report.verdict.reason, "no user agent");
    }

    #[test]
    fn test_python_requests_blocked_by_signature() {
        let lookups = ip_ok();
        let (report, nav) = run(
            config(),
            StaticEnvironment::browser("python-requests/2.31.0"),
            &lookups,
        );
        assert!(!report.verdict.allowed);
        assert_eq!(report.verdict.reason, "suspicious user agent: python");
        assert_eq!(nav.visits.borrow().len(), 1);
        // Only the address lookup ran before the block.
        assert_eq!(lookups.call_count(), 1);
    }

    #[test]
    fn test_signature_check_can_be_switched_off() {
        let lookups = ip_ok();
        let mut config = config();
        config.block_ua = false;
        config.block_vpn = false;
        config.block_proxy_rdp = false;
        let (report, _) = run(config, StaticEnvironment::browser("curl/8.4.0"), &lookups);
        assert!(report.verdict.allowed);
    }

    #[test]
    fn test_storage_unavailable_blocks() {
        let lookups = ip_ok();
        let env = StaticEnvironment::browser(UA).without_local_storage();
        let (report, _) = run(config(), env, &lookups);
        assert!(!report.verdict.allowed);
        assert_eq!(report.verdict.reason, "storage not available");
    }

    #[test]
    fn test_canvas_failure_blocks() {
        let lookups = ip_ok();
        let env = StaticEnvironment::browser(UA).with_canvas(CanvasProbe::NoContext);
        let (report, _) = run(config(), env, &lookups);
        assert_eq!(report.verdict.reason, "canvas not available");
    }

    #[test]
    fn test_aws_origin_blocked_as_hosting() {
        let lookups = ip_ok().respond(
            "https://ipapi.co/203.0.113.50/json/",
            LookupResponse::json(r#"{"org":"Amazon Technologies Inc (AWS)"}"#),
        );
        let (report, nav) = run(config(), StaticEnvironment::browser(UA), &lookups);
        assert!(!report.verdict.allowed);
        assert_eq!(report.verdict.reason, "hosting provider: amazon");
        assert_eq!(nav.visits.borrow().len(), 1);
    }

    #[test]
    fn test_vpn_only_blocking_uses_vpn_keywords() {
        let lookups = ip_ok().respond(
            "https://ipapi.co/",
            LookupResponse::json(r#"{"org":"Private Internet Access VPN"}"#),
        );
        let mut config = config();
        config.block_isp = false;
        let (report, _) = run(config, StaticEnvironment::browser(UA), &lookups);
        assert_eq!(report.verdict.reason, "vpn/proxy detected: vpn");
    }

    #[test]
    fn test_hosting_ignored_when_isp_blocking_off() {
        let lookups = ip_ok().respond(
            "https://ipapi.co/",
            LookupResponse::json(r#"{"org":"Hetzner Online GmbH"}"#),
        );
        let mut config = config();
        config.block_isp = false;
        let (report, _) = run(config, StaticEnvironment::browser(UA), &lookups);
        assert!(report.verdict.allowed);
    }

    #[test]
    fn test_classification_unavailable_fails_open() {
        // Address resolves, every reputation provider is unreachable.
        let lookups = ip_ok();
        let (report, nav) = run(config(), StaticEnvironment::browser(UA), &lookups);
        assert!(report.verdict.allowed);
        assert_eq!(
            report.verdict.reason,
            "checks passed; classification unavailable"
        );
        assert!(nav.visits.borrow().is_empty());
        assert_eq!(lookups.call_count(), 1 + 3);
    }

    #[test]
    fn test_unresolved_address_is_retried_then_fails_open() {
        let lookups = ScriptedLookups::new();
        let (report, _) = run(config(), StaticEnvironment::browser(UA), &lookups);
        assert!(report.verdict.allowed);
        assert_eq!(report.verdict.reason, "checks passed; address unresolved");
        // Two full passes over the five address providers, no reputation lookups.
        assert_eq!(lookups.call_count(), 10);
        // Each pass leaves its own marker.
        assert_eq!(report.trace.exhausted().collect::<Vec<_>>(), vec!["ip", "ip"]);
        assert!(report.trace.events().iter().any(|e| matches!(
            e,
            TraceEvent::Exhausted { chain, attempts: 5 } if chain == "ip"
        )));
    }

    #[test]
    fn test_reputation_skipped_when_both_flags_off() {
        let lookups = ip_ok();
        let mut config = config();
        config.block_vpn = false;
        config.block_proxy_rdp = false;
        let (report, _) = run(config, StaticEnvironment::browser(UA), &lookups);
        assert!(report.verdict.allowed);
        assert_eq!(report.verdict.reason, "checks passed");
        assert_eq!(lookups.call_count(), 1);
    }

    #[test]
    fn test_trace_records_attempts_and_checks() {
        let lookups = ScriptedLookups::new()
            .fail("https://api.ipify.org", "refused")
            .respond("https://api64.ipify.org", LookupResponse::json(r#"{"ip":"192.0.2.8"}"#));
        let mut config = config();
        config.block_vpn = false;
        config.block_proxy_rdp = false;
        let (report, _) = run(config, StaticEnvironment::browser(UA), &lookups);
        let providers: Vec<&str> = report.trace.lookups().map(|a| a.provider.as_str()).collect();
        assert_eq!(providers, vec!["ipify", "ipify64"]);
        assert!(report.trace.events().iter().any(|e| matches!(
            e,
            TraceEvent::Check { check, passed: true, .. } if check == "capability"
        )));
    }

    #[test]
    fn test_deliver_without_pending_lookup_is_rejected() {
        let mut gate = AutomationGate::new(config(), StaticEnvironment::browser(UA));
        assert_eq!(
            gate.deliver(Ok(LookupResponse::text("1.2.3.4"))),
            Err(GateError::NotWaiting(GateKind::Automation))
        );
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut gate = AutomationGate::new(config(), StaticEnvironment::browser(UA));
        assert!(matches!(gate.start(), Ok(GateStep::Fetch(_))));
        assert_eq!(gate.state(), GateState::Running);
        assert_eq!(
            gate.start(),
            Err(GateError::AlreadyStarted(GateKind::Automation))
        );
    }

    #[test]
    fn test_no_completion_after_block() {
        let lookups = ip_ok();
        let navigator = RecordingNavigator::default();
        let mut gate = AutomationGate::new(config(), StaticEnvironment::browser("Wget/1.21"));
        run_blocking(&mut gate, |r| lookups.lookup(r), &navigator).unwrap();
        assert!(!gate.is_complete());
        assert_eq!(gate.state(), GateState::Block);
    }
}
