use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::gate::GateState;
use crate::providers::{Attempt, Resolution};

/// Default number of events a gate keeps.
pub const DEFAULT_TRACE_CAPACITY: usize = 64;

/// One diagnostic event from a gate run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Transition {
        from: GateState,
        to: GateState,
    },
    Lookup(Attempt),
    Check {
        check: String,
        passed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// A chain ran out of providers without an accepted answer.
    Exhausted {
        chain: String,
        attempts: usize,
    },
}

impl TraceEvent {
    pub fn check(check: &str, passed: bool, detail: Option<String>) -> Self {
        TraceEvent::Check {
            check: check.to_string(),
            passed,
            detail,
        }
    }
}

/// Ring buffer of the last N trace events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    events: VecDeque<TraceEvent>,
    max_events: usize,
    /// Events pushed out of the buffer so far.
    dropped: usize,
}

impl Trace {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::new(),
            max_events,
            dropped: 0,
        }
    }

    pub fn record(&mut self, event: TraceEvent) {
        self.events.push_back(event);
        while self.events.len() > self.max_events {
            self.events.pop_front();
            self.dropped += 1;
        }
    }

    pub fn record_attempts(&mut self, attempts: impl IntoIterator<Item = Attempt>) {
        for attempt in attempts {
            self.record(TraceEvent::Lookup(attempt));
        }
    }

    /// Record the attempts of a finished resolution that found nothing,
    /// followed by an `Exhausted` marker for its chain.
    pub fn record_exhausted(&mut self, resolution: Resolution) {
        let chain = resolution.chain_label().to_string();
        let attempts = resolution.into_attempts();
        let count = attempts.len();
        self.record_attempts(attempts);
        self.record(TraceEvent::Exhausted {
            chain,
            attempts: count,
        });
    }

    pub fn events(&self) -> &VecDeque<TraceEvent> {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Lookup attempts still held in the buffer.
    pub fn lookups(&self) -> impl Iterator<Item = &Attempt> {
        self.events.iter().filter_map(|e| match e {
            TraceEvent::Lookup(attempt) => Some(attempt),
            _ => None,
        })
    }

    /// Chains that ran dry, once per exhausted resolution.
    pub fn exhausted(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            TraceEvent::Exhausted { chain, .. } => Some(chain.as_str()),
            _ => None,
        })
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY)
    }
}
