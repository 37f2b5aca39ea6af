//! `gatekeep check`: evaluate the gates for a described visitor.
//!
//! Lookups go to the real providers from this machine, so the visitor
//! address is this machine's public address. The browser side of the
//! visitor (identity, cookies, storage, canvas) comes from flags.

use anyhow::{Context, Result};
use gatekeep_client::{GateSelection, Gatekeeper, HttpFetcher, HttpSettings};
use gatekeep_core::capability::{CanvasProbe, StaticEnvironment};
use gatekeep_core::config::GateConfig;
use gatekeep_core::gate::Navigator;
use tracing::info;

/// A desktop Chrome identity, used when `--user-agent` is not given.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Browser features the simulated visitor lacks.
#[derive(Debug, Clone, Default)]
pub struct Disabled {
    pub cookies: bool,
    pub local_storage: bool,
    pub session_storage: bool,
    pub canvas: bool,
}

pub fn environment(user_agent: &str, disabled: &Disabled) -> StaticEnvironment {
    let mut env = StaticEnvironment::browser(user_agent);
    if disabled.cookies {
        env = env.without_cookies();
    }
    if disabled.local_storage {
        env = env.without_local_storage();
    }
    if disabled.session_storage {
        env = env.without_session_storage();
    }
    if disabled.canvas {
        env = env.with_canvas(CanvasProbe::NoContext);
    }
    env
}

/// Reports the redirect on stderr; stdout carries only the JSON reports.
struct StderrNavigator;

impl Navigator for StderrNavigator {
    fn navigate(&self, url: &str) {
        eprintln!("gatekeep: redirect to {url}");
    }
}

/// Run the selected gates and print their reports.
/// Returns whether every evaluated gate allowed the visitor.
pub async fn run(
    gate: GateConfig,
    http: &HttpSettings,
    selection: GateSelection,
    env: StaticEnvironment,
) -> Result<bool> {
    let fetcher = HttpFetcher::new(http).context("failed to set up HTTP client")?;
    let mut keeper = Gatekeeper::new(gate, fetcher);

    let reports = keeper
        .run(env, &StderrNavigator, selection)
        .await
        .context("gate run failed")?;

    let allowed = reports.allowed();
    info!(allowed, "gates finished");

    let json = serde_json::to_string_pretty(&reports).context("failed to encode reports")?;
    println!("{json}");
    Ok(allowed)
}
