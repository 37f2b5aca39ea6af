//! gatekeep-client: native async driver for gatekeep gates.
//!
//! Performs the lookups the gates ask for over HTTP (`reqwest`), runs the
//! automation and country gates concurrently, and exposes completion
//! signals a page can await.
//!
//! # Quick Start
//!
//! ```no_run
//! use gatekeep_client::{Gatekeeper, GateSelection, HttpFetcher, HttpSettings};
//! use gatekeep_core::{GateConfig, Navigator, StaticEnvironment};
//!
//! struct Log;
//! impl Navigator for Log {
//!     fn navigate(&self, url: &str) {
//!         println!("redirect to {url}");
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new(&HttpSettings::default())?;
//! let mut keeper = Gatekeeper::new(GateConfig::default(), fetcher);
//! let env = StaticEnvironment::browser("Mozilla/5.0 (X11; Linux x86_64)");
//! let reports = keeper.run(env, &Log, GateSelection::Both).await?;
//! println!("allowed: {}", reports.allowed());
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod fetch;
pub mod gatekeeper;
pub mod runner;
pub mod scripted;

// Re-export primary public types.
pub use completion::Completion;
pub use fetch::{ClientError, Fetch, HttpFetcher, HttpSettings};
pub use gatekeeper::{GateSelection, Gatekeeper, Reports};
pub use runner::{exhausted_chains, run_gate, FirstRedirect};
pub use scripted::ScriptedFetcher;
