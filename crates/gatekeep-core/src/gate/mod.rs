//! Gate state machines.
//!
//! A gate never performs I/O. The host drives it:
//!
//! ```text
//! start() ──► Fetch(request) ──► host performs GET ──► deliver(result) ──┐
//!               ▲                                                        │
//!               └────────────────────────────────────────────────────────┘
//!         ──► Complete(verdict)        page may proceed
//!         ──► Redirect { url, .. }     host navigates away, nothing else runs
//! ```
//!
//! At most one lookup is outstanding per gate at any time.

pub mod automation;
pub mod country;

pub use automation::AutomationGate;
pub use country::CountryGate;

use serde::{Deserialize, Serialize};

use crate::providers::{LookupError, LookupRequest, LookupResponse};
use crate::trace::{Trace, TraceEvent};

/// Which gate produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    Automation,
    Country,
}

impl GateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::Automation => "automation",
            GateKind::Country => "country",
        }
    }
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Init,
    /// The gate is switched off by configuration.
    Disabled,
    /// The visitor matched the operator address.
    Bypass,
    Running,
    Allow,
    /// Terminal: a redirect was issued.
    Block,
    /// Terminal: the visitor was allowed and completion is signalled.
    Complete,
}

/// Final decision of a gate. `reason` is diagnostic and never shown to the
/// visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: String,
}

impl Verdict {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Signals gathered about the visitor during one gate run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorSignals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// What the host must do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum GateStep {
    /// Perform this lookup and hand the result to `deliver`.
    Fetch(LookupRequest),
    /// The visitor is allowed.
    Complete(Verdict),
    /// The visitor is blocked: navigate to `url` and stop.
    Redirect { url: String, verdict: Verdict },
}

/// Everything a host needs after a gate finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub gate: GateKind,
    pub state: GateState,
    pub verdict: Verdict,
    pub signals: VisitorSignals,
    pub trace: Trace,
}

/// Host protocol misuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("{0} gate already started")]
    AlreadyStarted(GateKind),
    #[error("{0} gate is not waiting for a lookup")]
    NotWaiting(GateKind),
    #[error("{0} gate has not reached a verdict")]
    NotFinished(GateKind),
}

/// Common interface of both gates.
pub trait Gate {
    fn kind(&self) -> GateKind;

    fn state(&self) -> GateState;

    /// Begin evaluation. Valid once, from [`GateState::Init`].
    fn start(&mut self) -> Result<GateStep, GateError>;

    /// Hand back the outcome of the last requested lookup.
    fn deliver(
        &mut self,
        result: Result<LookupResponse, LookupError>,
    ) -> Result<GateStep, GateError>;

    /// Available once the gate reached a verdict.
    fn report(&self) -> Option<GateReport>;

    /// True once the visitor was allowed and completion may be signalled.
    fn is_complete(&self) -> bool {
        self.state() == GateState::Complete
    }
}

/// The redirect side effect. Fire-and-forget.
pub trait Navigator {
    fn navigate(&self, url: &str);
}

/// Drive a gate to its verdict, performing lookups with `lookup`.
pub fn run_blocking<G, F>(
    gate: &mut G,
    mut lookup: F,
    navigator: &dyn Navigator,
) -> Result<GateReport, GateError>
where
    G: Gate + ?Sized,
    F: FnMut(&LookupRequest) -> Result<LookupResponse, LookupError>,
{
    let mut step = gate.start()?;
    loop {
        match step {
            GateStep::Fetch(request) => step = gate.deliver(lookup(&request))?,
            GateStep::Redirect { url, .. } => {
                navigator.navigate(&url);
                break;
            }
            GateStep::Complete(_) => break,
        }
    }
    gate.report().ok_or(GateError::NotFinished(gate.kind()))
}

/// State, signals and trace shared by both gates.
#[derive(Debug)]
struct Run {
    kind: GateKind,
    state: GateState,
    signals: VisitorSignals,
    trace: Trace,
    verdict: Option<Verdict>,
    redirect_url: String,
}

impl Run {
    fn new(kind: GateKind, redirect_url: &str) -> Self {
        Self {
            kind,
            state: GateState::Init,
            signals: VisitorSignals::default(),
            trace: Trace::default(),
            verdict: None,
            redirect_url: redirect_url.to_string(),
        }
    }

    fn transition(&mut self, to: GateState) {
        self.trace.record(TraceEvent::Transition {
            from: self.state,
            to,
        });
        self.state = to;
    }

    fn check(&mut self, check: &str, passed: bool, detail: Option<String>) {
        self.trace.record(TraceEvent::check(check, passed, detail));
    }

    fn ensure_init(&self) -> Result<(), GateError> {
        if self.state == GateState::Init {
            Ok(())
        } else {
            Err(GateError::AlreadyStarted(self.kind))
        }
    }

    fn allow(&mut self, reason: impl Into<String>) -> GateStep {
        let verdict = Verdict::allow(reason);
        self.transition(GateState::Allow);
        self.verdict = Some(verdict.clone());
        self.transition(GateState::Complete);
        GateStep::Complete(verdict)
    }

    fn block(&mut self, reason: impl Into<String>) -> GateStep {
        let verdict = Verdict::block(reason);
        self.transition(GateState::Block);
        self.verdict = Some(verdict.clone());
        GateStep::Redirect {
            url: self.redirect_url.clone(),
            verdict,
        }
    }

    fn report(&self) -> Option<GateReport> {
        self.verdict.as_ref().map(|verdict| GateReport {
            gate: self.kind,
            state: self.state,
            verdict: verdict.clone(),
            signals: self.signals.clone(),
            trace: self.trace.clone(),
        })
    }
}
