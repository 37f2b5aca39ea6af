//! Country gate: allow a single country, plus one bypass address.

use std::mem;

use crate::config::GateConfig;
use crate::geo::{self, UNKNOWN_COUNTRY};
use crate::ip::{self, UNRESOLVED_IP};
use crate::providers::{LookupError, LookupResponse, Progress, Resolution};

use super::{Gate, GateError, GateKind, GateReport, GateState, GateStep, Run};

#[derive(Debug)]
enum Stage {
    Idle,
    ResolvingIp(Resolution),
    ResolvingCountry(Resolution),
    Finished,
}

pub struct CountryGate {
    config: GateConfig,
    run: Run,
    stage: Stage,
}

impl CountryGate {
    pub fn new(config: GateConfig) -> Self {
        let run = Run::new(GateKind::Country, &config.redirect_url);
        Self {
            config,
            run,
            stage: Stage::Idle,
        }
    }

    fn ip_resolved(&mut self, address: Option<String>) -> GateStep {
        let address = address.unwrap_or_else(|| UNRESOLVED_IP.to_string());
        self.run.signals.ip_address = Some(address.clone());

        // Plain string comparison: an unresolved address equals the default
        // bypass value.
        if address == self.config.bypass_address {
            self.run.transition(GateState::Bypass);
            return self.finish_allow("operator address bypass");
        }

        if !ip::is_resolved(&address) {
            return self.country_resolved(None);
        }

        let resolution = Resolution::new(geo::chain(&self.config.ipinfo_token), address);
        match resolution.request() {
            Some(request) => {
                self.stage = Stage::ResolvingCountry(resolution);
                GateStep::Fetch(request)
            }
            None => self.country_resolved(None),
        }
    }

    fn country_resolved(&mut self, country: Option<String>) -> GateStep {
        let country = country.unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());
        self.run.signals.country_code = Some(country.clone());

        let allowed = country.eq_ignore_ascii_case(self.config.allowed_country.trim());
        self.run.check("country", allowed, Some(country.clone()));
        if allowed {
            self.finish_allow(format!("country {country} allowed"))
        } else {
            self.stage = Stage::Finished;
            self.run.block(format!("country {country} not allowed"))
        }
    }

    fn finish_allow(&mut self, reason: impl Into<String>) -> GateStep {
        self.stage = Stage::Finished;
        self.run.allow(reason)
    }
}

impl Gate for CountryGate {
    fn kind(&self) -> GateKind {
        GateKind::Country
    }

    fn state(&self) -> GateState {
        self.run.state
    }

    fn start(&mut self) -> Result<GateStep, GateError> {
        self.run.ensure_init()?;

        if !self.config.country_block {
            self.run.transition(GateState::Disabled);
            return Ok(self.finish_allow("country check disabled"));
        }

        self.run.transition(GateState::Running);
        let resolution = Resolution::new(ip::chain(), "");
        Ok(match resolution.request() {
            Some(request) => {
                self.stage = Stage::ResolvingIp(resolution);
                GateStep::Fetch(request)
            }
            None => self.ip_resolved(None),
        })
    }

    fn deliver(
        &mut self,
        result: Result<LookupResponse, LookupError>,
    ) -> Result<GateStep, GateError> {
        match mem::replace(&mut self.stage, Stage::Finished) {
            Stage::ResolvingIp(mut resolution) => match resolution.deliver(result) {
                Progress::Next(request) => {
                    self.stage = Stage::ResolvingIp(resolution);
                    Ok(GateStep::Fetch(request))
                }
                Progress::Resolved(address) => {
                    self.run.trace.record_attempts(resolution.into_attempts());
                    Ok(self.ip_resolved(Some(address)))
                }
                Progress::Exhausted => {
                    self.run.trace.record_exhausted(resolution);
                    Ok(self.ip_resolved(None))
                }
            },
            Stage::ResolvingCountry(mut resolution) => match resolution.deliver(result) {
                Progress::Next(request) => {
                    self.stage = Stage::ResolvingCountry(resolution);
                    Ok(GateStep::Fetch(request))
                }
                Progress::Resolved(country) => {
                    self.run.trace.record_attempts(resolution.into_attempts());
                    Ok(self.country_resolved(Some(country)))
                }
                Progress::Exhausted => {
                    self.run.trace.record_exhausted(resolution);
                    Ok(self.country_resolved(None))
                }
            },
            other => {
                self.stage = other;
                Err(GateError::NotWaiting(GateKind::Country))
            }
        }
    }

    fn report(&self) -> Option<GateReport> {
        self.run.report()
    }
}
