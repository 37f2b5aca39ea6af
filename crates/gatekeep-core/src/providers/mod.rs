//! Lookup providers and the ordered provider chain.
//!
//! A [`Provider`] knows how to build one request, how to read the body the
//! service answers with, and which value to pull out of it. A
//! [`ProviderChain`] is an ordered list of providers plus the validator
//! every extracted value must pass. [`Resolution`] walks a chain one
//! provider at a time without doing any I/O itself: the caller performs
//! each [`LookupRequest`] and hands the outcome back through
//! [`Resolution::deliver`].

mod mock;

pub use mock::ScriptedLookups;

use serde::{Deserialize, Serialize};

/// One HTTP GET the host must perform on behalf of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub provider: String,
    pub url: String,
    pub accept: String,
}

/// What the host got back for a [`LookupRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub body: String,
}

impl LookupResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json; charset=utf-8".to_string()),
            body: body.into(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/plain; charset=utf-8".to_string()),
            body: body.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    fn declares_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false)
    }
}

/// A parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
}

impl Body {
    /// Parse a response body.
    ///
    /// A declared JSON content type must parse as JSON. Anything else is
    /// trimmed and given one structured parse attempt when it looks like a
    /// JSON document; otherwise it stays plain text.
    pub fn parse(response: &LookupResponse) -> Result<Body, LookupError> {
        if !(200..300).contains(&response.status) {
            return Err(LookupError::NetworkFailure(format!(
                "HTTP status {}",
                response.status
            )));
        }

        if response.declares_json() {
            return serde_json::from_str(&response.body)
                .map(Body::Json)
                .map_err(|e| LookupError::MalformedResponse(e.to_string()));
        }

        let text = response.body.trim();
        if text.starts_with('{') || text.starts_with('[') {
            if let Ok(value) = serde_json::from_str(text) {
                return Ok(Body::Json(value));
            }
        }
        Ok(Body::Text(text.to_string()))
    }
}

/// Errors from a single provider attempt. None of these ever abort a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LookupError {
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("validation failure: {0}")]
    ValidationFailure(String),
}

/// Trait every lookup provider implements.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Build the request for `subject` (the address being looked up; empty
    /// when the service reports the caller's own address).
    fn request(&self, subject: &str) -> LookupRequest;

    fn parse(&self, response: &LookupResponse) -> Result<Body, LookupError> {
        Body::parse(response)
    }

    /// Pull the raw value out of a parsed body. Validation happens later,
    /// at the chain level.
    fn extract(&self, body: &Body) -> Result<String, LookupError>;
}

/// A provider backed by a plain HTTP GET endpoint.
///
/// `{ip}` and `{token}` in the URL template are substituted at request
/// time. Field paths are dotted (`location.country`) and tried in order;
/// the first non-empty string or number wins.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    name: String,
    url_template: String,
    token: String,
    fields: Vec<String>,
    accepts_text: bool,
}

impl HttpProvider {
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            token: String::new(),
            fields: Vec::new(),
            accepts_text: false,
        }
    }

    pub fn field(mut self, path: impl Into<String>) -> Self {
        self.fields.push(path.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Accept a plain-text body as the value itself.
    pub fn accepting_text(mut self) -> Self {
        self.accepts_text = true;
        self
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }
}

impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn request(&self, subject: &str) -> LookupRequest {
        LookupRequest {
            provider: self.name.clone(),
            url: self
                .url_template
                .replace("{ip}", subject)
                .replace("{token}", &self.token),
            accept: "application/json".to_string(),
        }
    }

    fn extract(&self, body: &Body) -> Result<String, LookupError> {
        match body {
            Body::Json(value) => self
                .fields
                .iter()
                .find_map(|path| lookup_path(value, path))
                .ok_or_else(|| {
                    LookupError::ValidationFailure(format!(
                        "none of [{}] present",
                        self.fields.join(", ")
                    ))
                }),
            Body::Text(text) if self.accepts_text => Ok(text.clone()),
            Body::Text(_) => Err(LookupError::MalformedResponse(
                "expected a structured body, got plain text".to_string(),
            )),
        }
    }
}

fn lookup_path(value: &serde_json::Value, path: &str) -> Option<String> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    match current {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Validates and normalizes an extracted value. `Err` carries the reason.
pub type Validator = fn(&str) -> Result<String, String>;

/// An ordered list of providers. Order is priority and is never changed.
pub struct ProviderChain {
    label: &'static str,
    providers: Vec<Box<dyn Provider>>,
    validator: Validator,
}

impl ProviderChain {
    pub fn new(label: &'static str, validator: Validator) -> Self {
        Self {
            label,
            providers: Vec::new(),
            validator,
        }
    }

    pub fn with_provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// The request every provider would make for `subject`, in order.
    pub fn requests(&self, subject: &str) -> Vec<LookupRequest> {
        self.providers.iter().map(|p| p.request(subject)).collect()
    }

    pub fn validate(&self, raw: &str) -> Result<String, String> {
        (self.validator)(raw)
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("label", &self.label)
            .field("providers", &self.provider_names())
            .finish()
    }
}

/// Outcome of one provider attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub chain: String,
    pub provider: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted { value: String },
    Failed { error: LookupError },
}

/// What to do after delivering one provider result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Resolved(String),
    /// The previous provider failed; perform this request next.
    Next(LookupRequest),
    Exhausted,
}

/// Sans-IO walk over a [`ProviderChain`].
#[derive(Debug)]
pub struct Resolution {
    chain: ProviderChain,
    subject: String,
    index: usize,
    attempts: Vec<Attempt>,
}

impl Resolution {
    pub fn new(chain: ProviderChain, subject: impl Into<String>) -> Self {
        Self {
            chain,
            subject: subject.into(),
            index: 0,
            attempts: Vec::new(),
        }
    }

    /// The request for the provider currently being tried, if any remain.
    pub fn request(&self) -> Option<LookupRequest> {
        self.chain
            .providers
            .get(self.index)
            .map(|p| p.request(&self.subject))
    }

    /// Record the result of the current provider and advance.
    ///
    /// Calling this on an exhausted resolution returns
    /// [`Progress::Exhausted`] again and records nothing.
    pub fn deliver(&mut self, result: Result<LookupResponse, LookupError>) -> Progress {
        let Some(provider) = self.chain.providers.get(self.index) else {
            return Progress::Exhausted;
        };

        let outcome = result
            .and_then(|response| provider.parse(&response))
            .and_then(|body| provider.extract(&body))
            .and_then(|raw| {
                self.chain
                    .validate(&raw)
                    .map_err(LookupError::ValidationFailure)
            });

        self.attempts.push(Attempt {
            chain: self.chain.label.to_string(),
            provider: provider.name().to_string(),
            outcome: match &outcome {
                Ok(value) => AttemptOutcome::Accepted {
                    value: value.clone(),
                },
                Err(error) => AttemptOutcome::Failed {
                    error: error.clone(),
                },
            },
        });

        match outcome {
            Ok(value) => {
                self.index = self.chain.providers.len();
                Progress::Resolved(value)
            }
            Err(_) => {
                self.index += 1;
                match self.request() {
                    Some(request) => Progress::Next(request),
                    None => Progress::Exhausted,
                }
            }
        }
    }

    pub fn chain_label(&self) -> &'static str {
        self.chain.label()
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn into_attempts(self) -> Vec<Attempt> {
        self.attempts
    }
}

/// Final value of a chain walk: `None` when every provider failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub value: Option<String>,
    pub attempts: Vec<Attempt>,
}

impl ResolutionResult {
    pub fn success(&self) -> bool {
        self.value.is_some()
    }
}

/// Walk a chain synchronously, performing each lookup with `lookup`.
pub fn resolve_with<F>(chain: ProviderChain, subject: &str, mut lookup: F) -> ResolutionResult
where
    F: FnMut(&LookupRequest) -> Result<LookupResponse, LookupError>,
{
    let mut resolution = Resolution::new(chain, subject);
    let mut next = resolution.request();
    let mut value = None;

    while let Some(request) = next.take() {
        match resolution.deliver(lookup(&request)) {
            Progress::Resolved(v) => value = Some(v),
            Progress::Next(request) => next = Some(request),
            Progress::Exhausted => {}
        }
    }

    ResolutionResult {
        value,
        attempts: resolution.into_attempts(),
    }
}
