//! Running both gates for one page load.

use gatekeep_core::capability::Environment;
use gatekeep_core::config::GateConfig;
use gatekeep_core::gate::{
    AutomationGate, CountryGate, GateError, GateKind, GateReport, GateState, Navigator,
};
use serde::{Deserialize, Serialize};

use crate::completion::Completion;
use crate::fetch::Fetch;
use crate::runner::{run_gate, FirstRedirect};

/// Which gates a run evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateSelection {
    Automation,
    Country,
    #[default]
    Both,
}

impl GateSelection {
    pub fn includes(&self, kind: GateKind) -> bool {
        matches!(
            (self, kind),
            (GateSelection::Both, _)
                | (GateSelection::Automation, GateKind::Automation)
                | (GateSelection::Country, GateKind::Country)
        )
    }
}

/// Reports from one run. A gate that was not selected has no report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reports {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation: Option<GateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<GateReport>,
}

impl Reports {
    /// True when every evaluated gate allowed the visitor.
    pub fn allowed(&self) -> bool {
        self.iter().all(|r| r.verdict.allowed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GateReport> {
        self.automation.iter().chain(self.country.iter())
    }
}

/// Evaluates the gates for a page load against one configuration.
pub struct Gatekeeper<F: Fetch> {
    config: GateConfig,
    fetcher: F,
    completion: Completion,
}

impl<F: Fetch> Gatekeeper<F> {
    pub fn new(config: GateConfig, fetcher: F) -> Self {
        Self {
            config,
            fetcher,
            completion: Completion::new(),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Run the selected gates concurrently for one page load. Each gate
    /// awaits its own lookups one at a time; at most one redirect reaches
    /// `navigator`. Completion flags from an earlier run are lowered first.
    pub async fn run<E: Environment>(
        &mut self,
        env: E,
        navigator: &dyn Navigator,
        selection: GateSelection,
    ) -> Result<Reports, GateError> {
        self.completion.reset();
        let this = &*self;
        let navigator = FirstRedirect::new(navigator);

        let automation = async {
            if !selection.includes(GateKind::Automation) {
                return Ok(None);
            }
            let mut gate = AutomationGate::new(this.config.clone(), env);
            let report = run_gate(&mut gate, &this.fetcher, &navigator).await?;
            this.settle(&report);
            Ok::<_, GateError>(Some(report))
        };

        let country = async {
            if !selection.includes(GateKind::Country) {
                return Ok(None);
            }
            let mut gate = CountryGate::new(this.config.clone());
            let report = run_gate(&mut gate, &this.fetcher, &navigator).await?;
            this.settle(&report);
            Ok::<_, GateError>(Some(report))
        };

        let (automation, country) = tokio::join!(automation, country);
        Ok(Reports {
            automation: automation?,
            country: country?,
        })
    }

    fn settle(&self, report: &GateReport) {
        if report.state == GateState::Complete {
            self.completion.signal(report.gate);
        }
    }
}
