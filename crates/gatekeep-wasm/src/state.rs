//! Global WASM state: singleton runtime holding both gates for the page.
//!
//! WASM is single-threaded, so we use a raw pointer to avoid Rust 2024's
//! `static_mut_refs` restrictions. Access is always safe in single-threaded WASM.

use gatekeep_core::config::GateConfig;
use gatekeep_core::gate::{AutomationGate, CountryGate, Gate, GateKind};

use crate::host::HostEnvironment;

/// A gate plus the JSON buffer holding its last step.
pub struct Slot<G> {
    pub gate: G,
    pub result: String,
}

impl<G> Slot<G> {
    fn new(gate: G) -> Self {
        Self {
            gate,
            result: String::new(),
        }
    }
}

/// The complete runtime state for one page load.
pub struct Runtime {
    pub automation: Slot<AutomationGate<HostEnvironment>>,
    pub country: Slot<CountryGate>,
}

impl Runtime {
    /// The gate for `kind` together with its result buffer.
    pub fn slot(&mut self, kind: GateKind) -> (&mut dyn Gate, &mut String) {
        match kind {
            GateKind::Automation => {
                let gate: &mut dyn Gate = &mut self.automation.gate;
                (gate, &mut self.automation.result)
            }
            GateKind::Country => {
                let gate: &mut dyn Gate = &mut self.country.gate;
                (gate, &mut self.country.result)
            }
        }
    }
}

/// Raw pointer to the heap-allocated runtime. WASM is single-threaded so this is safe.
static mut RT_PTR: *mut Runtime = std::ptr::null_mut();

/// Initialize the global runtime. Replaces any existing runtime, which
/// resets both gates.
pub fn init(config: GateConfig) {
    let rt = Box::new(Runtime {
        automation: Slot::new(AutomationGate::new(config.clone(), HostEnvironment)),
        country: Slot::new(CountryGate::new(config)),
    });
    unsafe {
        // Drop previous runtime if any
        if !RT_PTR.is_null() {
            drop(Box::from_raw(RT_PTR));
        }
        RT_PTR = Box::into_raw(rt);
    }
}

/// Get a mutable reference to the runtime, if `gatekeep_init` has run.
pub fn get() -> Option<&'static mut Runtime> {
    unsafe {
        if RT_PTR.is_null() {
            None
        } else {
            Some(&mut *RT_PTR)
        }
    }
}
