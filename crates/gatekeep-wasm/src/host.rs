//! Host imports: functions provided by the JS page to the WASM module.
//!
//! On wasm32 targets, these are real extern "C" imports from the host.
//! On native targets (for testing), they are stubs describing a client
//! with no browser features at all.

use gatekeep_core::capability::{CanvasProbe, Environment};

#[cfg(target_arch = "wasm32")]
mod ffi {
    unsafe extern "C" {
        pub fn host_log(level: i32, msg_ptr: *const u8, msg_len: u32);
        pub fn host_navigate(url_ptr: *const u8, url_len: u32);
        pub fn host_events_emit(
            topic_ptr: *const u8,
            topic_len: u32,
            payload_ptr: *const u8,
            payload_len: u32,
        );
        /// Writes `navigator.userAgent` into `out_ptr`, returns bytes written.
        pub fn host_user_agent(out_ptr: *mut u8, max_len: u32) -> u32;
        pub fn host_cookies_enabled() -> i32;
        /// `kind`: 0 = localStorage, 1 = sessionStorage. Returns 1 if usable.
        pub fn host_storage_available(kind: i32) -> i32;
        /// Draws test text on a 2-D canvas and serializes it. Returns the data
        /// URI length (0 = empty), -1 when no 2-D context exists, -2 when
        /// drawing or serialization threw.
        pub fn host_canvas_probe() -> i32;
    }
}

pub const LOG_ERROR: i32 = 0;
pub const LOG_WARN: i32 = 1;
pub const LOG_INFO: i32 = 2;
pub const LOG_DEBUG: i32 = 3;

#[cfg(target_arch = "wasm32")]
const USER_AGENT_MAX: usize = 4096;

/// Safe wrapper: log a string at a given level.
pub fn log(level: i32, msg: &str) {
    #[cfg(target_arch = "wasm32")]
    unsafe {
        ffi::host_log(level, msg.as_ptr(), msg.len() as u32);
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (level, msg);
    }
}

/// Safe wrapper: replace the current page with `url`.
pub fn navigate(url: &str) {
    #[cfg(target_arch = "wasm32")]
    unsafe {
        ffi::host_navigate(url.as_ptr(), url.len() as u32);
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = url;
    }
}

/// Safe wrapper: emit an event.
pub fn emit_event(topic: &str, payload: &str) {
    #[cfg(target_arch = "wasm32")]
    unsafe {
        ffi::host_events_emit(
            topic.as_ptr(),
            topic.len() as u32,
            payload.as_ptr(),
            payload.len() as u32,
        );
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (topic, payload);
    }
}

/// The page's browser, queried through host imports on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostEnvironment;

impl Environment for HostEnvironment {
    fn user_agent(&self) -> String {
        #[cfg(target_arch = "wasm32")]
        {
            let mut buf = vec![0u8; USER_AGENT_MAX];
            let n = unsafe { ffi::host_user_agent(buf.as_mut_ptr(), buf.len() as u32) } as usize;
            buf.truncate(n.min(USER_AGENT_MAX));
            String::from_utf8_lossy(&buf).into_owned()
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            String::new()
        }
    }

    fn cookies_enabled(&self) -> bool {
        #[cfg(target_arch = "wasm32")]
        {
            unsafe { ffi::host_cookies_enabled() == 1 }
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            false
        }
    }

    fn local_storage_available(&self) -> bool {
        storage_available(0)
    }

    fn session_storage_available(&self) -> bool {
        storage_available(1)
    }

    fn canvas_probe(&self) -> CanvasProbe {
        #[cfg(target_arch = "wasm32")]
        let code = unsafe { ffi::host_canvas_probe() };
        #[cfg(not(target_arch = "wasm32"))]
        let code = -1;
        canvas_from_code(code)
    }
}

fn storage_available(kind: i32) -> bool {
    #[cfg(target_arch = "wasm32")]
    {
        unsafe { ffi::host_storage_available(kind) == 1 }
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = kind;
        false
    }
}

fn canvas_from_code(code: i32) -> CanvasProbe {
    match code {
        n if n >= 0 => CanvasProbe::Rendered {
            data_uri_len: n as usize,
        },
        -1 => CanvasProbe::NoContext,
        _ => CanvasProbe::Failed {
            reason: format!("host canvas probe error {code}"),
        },
    }
}
