mod host;
mod state;

use gatekeep_core::config::GateConfig;
use gatekeep_core::gate::{GateKind, GateStep};
use gatekeep_core::providers::{LookupError, LookupResponse};
use serde::Deserialize;

// ── Step codes ───────────────────────────────────────────────────────
// Returned by gatekeep_start / gatekeep_deliver.

/// Result buffer holds a LookupRequest; perform it and call gatekeep_deliver.
pub const STEP_FETCH: i32 = 1;
/// Result buffer holds the allowing Verdict.
pub const STEP_COMPLETE: i32 = 2;
/// host_navigate was called; result buffer holds `{url, verdict}`.
pub const STEP_REDIRECT: i32 = 3;

pub const ERR_BAD_INPUT: i32 = -1;
pub const ERR_NOT_INITIALIZED: i32 = -2;
pub const ERR_UNKNOWN_GATE: i32 = -3;
pub const ERR_PROTOCOL: i32 = -4;

/// What the host hands back after performing a lookup.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Delivery {
    /// Any HTTP response, whatever its status.
    Response(LookupResponse),
    /// The request never produced a response (offline, timeout, CORS).
    Error(String),
}

impl From<Delivery> for Result<LookupResponse, LookupError> {
    fn from(delivery: Delivery) -> Self {
        match delivery {
            Delivery::Response(response) => Ok(response),
            Delivery::Error(reason) => Err(LookupError::NetworkFailure(reason)),
        }
    }
}

// ── Helper: read string from WASM memory ─────────────────────────────

fn read_str(ptr: *const u8, len: u32) -> Option<&'static str> {
    if ptr.is_null() {
        return None;
    }
    let bytes = unsafe { std::slice::from_raw_parts(ptr, len as usize) };
    std::str::from_utf8(bytes).ok()
}

fn write_to_buffer(s: &str, out_ptr: *mut u8, max_len: u32) -> u32 {
    let bytes = s.as_bytes();
    let copy_len = bytes.len().min(max_len as usize);
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), out_ptr, copy_len);
    }
    copy_len as u32
}

fn gate_kind(gate: i32) -> Option<GateKind> {
    match gate {
        0 => Some(GateKind::Automation),
        1 => Some(GateKind::Country),
        _ => None,
    }
}

/// Store the step in the gate's result buffer, perform its side effects
/// and map it to a step code.
fn settle(kind: GateKind, step: GateStep, result: &mut String) -> i32 {
    match step {
        GateStep::Fetch(request) => {
            host::log(
                host::LOG_DEBUG,
                &format!("gatekeep: {kind} lookup via {}", request.provider),
            );
            *result = serde_json::to_string(&request).unwrap_or_default();
            STEP_FETCH
        }
        GateStep::Complete(verdict) => {
            *result = serde_json::to_string(&verdict).unwrap_or_default();
            host::log(
                host::LOG_INFO,
                &format!("gatekeep: {kind} allowed ({})", verdict.reason),
            );
            host::emit_event(&format!("gate.{kind}.complete"), result);
            STEP_COMPLETE
        }
        GateStep::Redirect { url, verdict } => {
            *result = serde_json::json!({ "url": url, "verdict": verdict }).to_string();
            host::log(
                host::LOG_INFO,
                &format!("gatekeep: {kind} blocked ({})", verdict.reason),
            );
            host::emit_event(&format!("gate.{kind}.blocked"), result);
            host::navigate(&url);
            STEP_REDIRECT
        }
    }
}

// ── LIFECYCLE EXPORTS ────────────────────────────────────────────────

/// Initialize both gates with a JSON config (every key optional).
/// Returns 0 on success or `ERR_BAD_INPUT` when the config is not UTF-8
/// JSON. Questionable values are logged as warnings and never refused.
#[unsafe(no_mangle)]
pub extern "C" fn gatekeep_init(config_ptr: *const u8, config_len: u32) -> i32 {
    let config_str = match read_str(config_ptr, config_len) {
        Some(s) => s,
        None => return ERR_BAD_INPUT,
    };

    let config = match GateConfig::from_json(config_str) {
        Ok(c) => c,
        Err(e) => {
            host::log(host::LOG_ERROR, &format!("gatekeep: {e}"));
            return ERR_BAD_INPUT;
        }
    };

    for warning in config.warnings() {
        host::log(host::LOG_WARN, &format!("gatekeep: {warning}"));
    }

    state::init(config);

    host::log(host::LOG_INFO, "gatekeep: gates initialized");
    0
}

// ── MEMORY MANAGEMENT ────────────────────────────────────────────────

/// Allocate memory in WASM linear memory (for host to write into).
#[unsafe(no_mangle)]
pub extern "C" fn gatekeep_alloc(size: u32) -> *mut u8 {
    match std::alloc::Layout::from_size_align(size as usize, 1) {
        Ok(layout) if layout.size() > 0 => unsafe { std::alloc::alloc(layout) },
        _ => std::ptr::null_mut(),
    }
}

/// Deallocate memory in WASM linear memory.
#[unsafe(no_mangle)]
pub extern "C" fn gatekeep_dealloc(ptr: *mut u8, size: u32) {
    if ptr.is_null() {
        return;
    }
    if let Ok(layout) = std::alloc::Layout::from_size_align(size as usize, 1) {
        unsafe { std::alloc::dealloc(ptr, layout) }
    }
}

// ── GATE CONTROL ─────────────────────────────────────────────────────
// gate: 0 = automation, 1 = country.

/// Begin evaluating a gate.
/// Returns a step code (1 fetch, 2 complete, 3 redirect) or a negative error.
#[unsafe(no_mangle)]
pub extern "C" fn gatekeep_start(gate: i32) -> i32 {
    let Some(kind) = gate_kind(gate) else {
        return ERR_UNKNOWN_GATE;
    };
    let Some(rt) = state::get() else {
        return ERR_NOT_INITIALIZED;
    };

    let (gate, result) = rt.slot(kind);
    match gate.start() {
        Ok(step) => settle(kind, step, result),
        Err(e) => {
            *result = e.to_string();
            ERR_PROTOCOL
        }
    }
}

/// Deliver the outcome of the last requested lookup (completes the async
/// trampoline). Input is `{"response": {status, content_type, body}}` or
/// `{"error": "reason"}`.
/// Returns a step code or a negative error.
#[unsafe(no_mangle)]
pub extern "C" fn gatekeep_deliver(gate: i32, json_ptr: *const u8, json_len: u32) -> i32 {
    let Some(kind) = gate_kind(gate) else {
        return ERR_UNKNOWN_GATE;
    };
    let json = match read_str(json_ptr, json_len) {
        Some(s) => s,
        None => return ERR_BAD_INPUT,
    };
    let delivery: Delivery = match serde_json::from_str(json) {
        Ok(d) => d,
        Err(_) => return ERR_BAD_INPUT,
    };
    let Some(rt) = state::get() else {
        return ERR_NOT_INITIALIZED;
    };

    let (gate, result) = rt.slot(kind);
    match gate.deliver(delivery.into()) {
        Ok(step) => settle(kind, step, result),
        Err(e) => {
            *result = e.to_string();
            ERR_PROTOCOL
        }
    }
}

/// Read a gate's result buffer (last step JSON, or the protocol error).
#[unsafe(no_mangle)]
pub extern "C" fn gatekeep_get_result(gate: i32, out_ptr: *mut u8, max_len: u32) -> u32 {
    let (Some(kind), Some(rt)) = (gate_kind(gate), state::get()) else {
        return 0;
    };
    let (_, result) = rt.slot(kind);
    write_to_buffer(result, out_ptr, max_len)
}

/// Length in bytes of a gate's result buffer, for sizing the read.
#[unsafe(no_mangle)]
pub extern "C" fn gatekeep_result_len(gate: i32) -> u32 {
    let (Some(kind), Some(rt)) = (gate_kind(gate), state::get()) else {
        return 0;
    };
    let (_, result) = rt.slot(kind);
    result.len() as u32
}

// ── QUERY ────────────────────────────────────────────────────────────

/// Returns 1 once the gate allowed the visitor, 0 otherwise, negative on error.
#[unsafe(no_mangle)]
pub extern "C" fn gatekeep_is_complete(gate: i32) -> i32 {
    let Some(kind) = gate_kind(gate) else {
        return ERR_UNKNOWN_GATE;
    };
    let Some(rt) = state::get() else {
        return ERR_NOT_INITIALIZED;
    };
    let (gate, _) = rt.slot(kind);
    if gate.is_complete() {
        1
    } else {
        0
    }
}

/// Write the gate's report (verdict, signals, trace) as JSON.
/// Returns bytes written; 0 before the gate reached a verdict.
#[unsafe(no_mangle)]
pub extern "C" fn gatekeep_get_report(gate: i32, out_ptr: *mut u8, max_len: u32) -> u32 {
    let (Some(kind), Some(rt)) = (gate_kind(gate), state::get()) else {
        return 0;
    };
    let (gate, _) = rt.slot(kind);
    match gate.report() {
        Some(report) => {
            let json = serde_json::to_string(&report).unwrap_or_default();
            write_to_buffer(&json, out_ptr, max_len)
        }
        None => 0,
    }
}

// ── TESTS ────────────────────────────────────────────────────────────
