//! gatekeep-core: visitor-screening gates, free of I/O.
//!
//! Two gates decide whether a page load may proceed: an automation gate
//! (user-agent signatures, browser capability probes, network-origin
//! reputation) and a country gate (single allowed country plus an operator
//! bypass address). Both are state machines the host drives by performing
//! the HTTP lookups they ask for; see [`gate`].

pub mod capability;
pub mod config;
pub mod gate;
pub mod geo;
pub mod ip;
pub mod providers;
pub mod reputation;
pub mod signature;
pub mod trace;

// Re-export commonly used items at crate root.
pub use capability::{CanvasProbe, CapabilityError, Environment, StaticEnvironment};
pub use config::{ConfigError, GateConfig};
pub use gate::{
    run_blocking, AutomationGate, CountryGate, Gate, GateError, GateKind, GateReport, GateState,
    GateStep, Navigator, Verdict, VisitorSignals,
};
pub use providers::{LookupError, LookupRequest, LookupResponse, ProviderChain};
pub use trace::{Trace, TraceEvent};
