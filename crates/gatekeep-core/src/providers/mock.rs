use std::cell::RefCell;

use super::*;

/// Scripted lookup double for tests and demos.
///
/// Responses are keyed by URL prefix and returned every time a matching
/// request arrives. Requests with no matching script fail with a network
/// error, so an unscripted provider behaves like an unreachable one.
pub struct ScriptedLookups {
    scripts: Vec<(String, Result<LookupResponse, LookupError>)>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedLookups {
    pub fn new() -> Self {
        Self {
            scripts: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn respond(mut self, url_prefix: impl Into<String>, response: LookupResponse) -> Self {
        self.scripts.push((url_prefix.into(), Ok(response)));
        self
    }

    pub fn fail(mut self, url_prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        self.scripts.push((
            url_prefix.into(),
            Err(LookupError::NetworkFailure(reason.into())),
        ));
        self
    }

    pub fn lookup(&self, request: &LookupRequest) -> Result<LookupResponse, LookupError> {
        self.calls.borrow_mut().push(request.url.clone());
        self.scripts
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| {
                Err(LookupError::NetworkFailure(format!(
                    "no scripted response for {}",
                    request.url
                )))
            })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Default for ScriptedLookups {
    fn default() -> Self {
        Self::new()
    }
}
