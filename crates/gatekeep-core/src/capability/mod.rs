//! Local browser capability probing. No network access happens here.

use serde::{Deserialize, Serialize};

/// Outcome of drawing text on a 2-D surface and serializing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CanvasProbe {
    /// Text was drawn and the surface serialized to a data URI of this length.
    Rendered { data_uri_len: usize },
    /// No 2-D drawing context could be created.
    NoContext,
    /// Drawing or serialization threw.
    Failed { reason: String },
}

/// The browser environment the gate runs in.
pub trait Environment {
    /// The declared client identity. Empty when the client sent none.
    fn user_agent(&self) -> String;
    fn cookies_enabled(&self) -> bool;
    fn local_storage_available(&self) -> bool;
    fn session_storage_available(&self) -> bool;
    fn canvas_probe(&self) -> CanvasProbe;
}

/// Why the environment does not look like a real browser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CapabilityError {
    #[error("no user agent")]
    MissingIdentity,
    #[error("cookies disabled")]
    CookiesDisabled,
    #[error("storage not available")]
    StorageUnavailable,
    #[error("canvas not available")]
    CanvasUnavailable,
    #[error("canvas serialization failed")]
    CanvasSerializationFailed,
    #[error("canvas test failed: {0}")]
    CanvasFailed(String),
}

/// Run the capability checks in order, stopping at the first failure.
pub fn probe(env: &dyn Environment) -> Result<(), CapabilityError> {
    if env.user_agent().is_empty() {
        return Err(CapabilityError::MissingIdentity);
    }
    if !env.cookies_enabled() {
        return Err(CapabilityError::CookiesDisabled);
    }
    if !env.local_storage_available() || !env.session_storage_available() {
        return Err(CapabilityError::StorageUnavailable);
    }
    match env.canvas_probe() {
        CanvasProbe::Rendered { data_uri_len } if data_uri_len > 0 => Ok(()),
        CanvasProbe::Rendered { .. } => Err(CapabilityError::CanvasSerializationFailed),
        CanvasProbe::NoContext => Err(CapabilityError::CanvasUnavailable),
        CanvasProbe::Failed { reason } => Err(CapabilityError::CanvasFailed(reason)),
    }
}

/// An environment described by plain values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticEnvironment {
    pub user_agent: String,
    pub cookies_enabled: bool,
    pub local_storage: bool,
    pub session_storage: bool,
    pub canvas: CanvasProbe,
}

impl StaticEnvironment {
    /// A fully capable browser presenting `user_agent`.
    pub fn browser(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            cookies_enabled: true,
            local_storage: true,
            session_storage: true,
            canvas: CanvasProbe::Rendered { data_uri_len: 2048 },
        }
    }

    pub fn without_cookies(mut self) -> Self {
        self.cookies_enabled = false;
        self
    }

    pub fn without_local_storage(mut self) -> Self {
        self.local_storage = false;
        self
    }

    pub fn without_session_storage(mut self) -> Self {
        self.session_storage = false;
        self
    }

    pub fn with_canvas(mut self, canvas: CanvasProbe) -> Self {
        self.canvas = canvas;
        self
    }
}

impl Environment for StaticEnvironment {
    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn cookies_enabled(&self) -> bool {
        self.cookies_enabled
    }

    fn local_storage_available(&self) -> bool {
        self.local_storage
    }

    fn session_storage_available(&self) -> bool {
        self.session_storage
    }

    fn canvas_probe(&self) -> CanvasProbe {
        self.canvas.clone()
    }
}
