//! Anti-forgery tokens bound to server-side sessions.

use thiserror::Error;
use uuid::Uuid;

use turnstile_core::SessionId;

use crate::{ConfigError, HttpMethod, RequestInfo, RequestMatcher};

/// Session attribute under which a session's token is stored.
pub const CSRF_SESSION_ATTRIBUTE: &str = "CSRF_SESSION_ATTRIBUTE";
/// Form parameter carrying the token back from the client.
pub const CSRF_PARAM_NAME: &str = "_csrf";
/// Header carrying the token back from the client (and out to it).
pub const CSRF_HEADER_NAME: &str = "X-CSRF-TOKEN";
/// Violation-report callback, never CSRF-checked.
pub const CSP_REPORT_PATH: &str = "/report-csp-violation";

const SAFE_METHODS: [HttpMethod; 4] = [
    HttpMethod::Get,
    HttpMethod::Head,
    HttpMethod::Trace,
    HttpMethod::Options,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    session_id: SessionId,
    value: String,
}

impl CsrfToken {
    /// Mint a fresh unguessable token for a session.
    pub fn generate(session_id: SessionId) -> Self {
        Self {
            session_id,
            value: Uuid::new_v4().to_string(),
        }
    }

    pub fn from_parts(session_id: SessionId, value: impl Into<String>) -> Self {
        Self {
            session_id,
            value: value.into(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Exact, whole-string comparison.
    pub fn matches(&self, candidate: &str) -> bool {
        self.value == candidate
    }
}

/// Server-side storage of tokens, scoped per session.
///
/// `load_or_create` must be atomic per session: two concurrent first
/// requests of one session observe the same token.
pub trait CsrfTokenRepository: Send + Sync {
    fn load(&self, session_id: SessionId) -> Option<CsrfToken>;
    fn load_or_create(&self, session_id: SessionId) -> CsrfToken;
    /// Replace the session's token with a fresh one.
    fn rotate(&self, session_id: SessionId) -> CsrfToken;
}

/// Why a state-changing request was rejected. Callers respond identically
/// to every variant; the distinction only feeds logs.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CsrfError {
    #[error("invalid CSRF token: none submitted")]
    MissingToken,

    #[error("invalid CSRF token: session has no token")]
    NoSessionToken,

    #[error("invalid CSRF token: mismatch")]
    Mismatch,
}

/// Result of a successful inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsrfCheck {
    /// Request needed no check; this is the session's current token, to be
    /// handed to the client.
    Skipped(CsrfToken),
    /// State-changing request carried the session's token.
    Verified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfGuard {
    strict: bool,
    exemptions: Vec<RequestMatcher>,
}

impl CsrfGuard {
    /// Strict mode accepts exactly GET/HEAD/TRACE/OPTIONS as safe and exempts
    /// only the exact violation-report path. Otherwise the report endpoint is
    /// exempt as a pattern, so anything below it is exempt too.
    pub fn new(strict: bool) -> Result<Self, ConfigError> {
        let report = if strict {
            RequestMatcher::exact_path(CSP_REPORT_PATH, None)
        } else {
            RequestMatcher::path(&format!("{CSP_REPORT_PATH}/**"), None)?
        };
        Ok(Self {
            strict,
            exemptions: vec![report],
        })
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Add a further exempt request shape.
    pub fn exempt(mut self, matcher: RequestMatcher) -> Self {
        self.exemptions.push(matcher);
        self
    }

    pub fn requires_protection(&self, request: &RequestInfo) -> bool {
        !SAFE_METHODS.contains(&request.method())
            && !self.exemptions.iter().any(|m| m.matches(request))
    }

    /// Check a request against the session's token.
    ///
    /// Requests that need no check load (or lazily mint) the session token so
    /// it can be attached to the response. Others must submit a value equal
    /// to the stored token.
    pub fn inspect<R>(
        &self,
        request: &RequestInfo,
        session_id: SessionId,
        submitted: Option<&str>,
        repository: &R,
    ) -> Result<CsrfCheck, CsrfError>
    where
        R: CsrfTokenRepository + ?Sized,
    {
        if !self.requires_protection(request) {
            return Ok(CsrfCheck::Skipped(repository.load_or_create(session_id)));
        }

        let submitted = submitted.ok_or(CsrfError::MissingToken)?;
        let stored = repository.load(session_id).ok_or(CsrfError::NoSessionToken)?;
        if stored.matches(submitted) {
            Ok(CsrfCheck::Verified)
        } else {
            Err(CsrfError::Mismatch)
        }
    }
}
