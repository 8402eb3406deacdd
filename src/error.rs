//! Uniform error taxonomy shared by every layer of the core.
//!
//! Every fallible operation in this crate eventually returns [`Error`], whose
//! [`ErrorKind`] maps directly onto the HTTP-adjacent error codes the
//! transport layer surfaces (`invalid_input`, `not_found`, `forbidden`, ...).
//! Lower layers (store, cache, limiter) define their own narrow error enums
//! and convert into [`Error`] only at the boundary, rather than leaking
//! backend-specific error types up through the public API.

use std::fmt;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// The stable error code surfaced to clients (`{ "error": <kind> }`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    InvalidId,
    InvalidUuid,
    InvalidRequest,
    InvalidLimit,
    InvalidOffset,
    InvalidGroupName,
    ProtectedGroup,
    Unauthorized,
    Forbidden,
    NotFound,
    DuplicateGroup,
    DuplicateAuthorizationSubject,
    Conflict,
    RateLimited,
    ServerError,
}

impl ErrorKind {
    /// Wire representation, e.g. `"invalid_input"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InvalidId => "invalid_id",
            ErrorKind::InvalidUuid => "invalid_uuid",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::InvalidLimit => "invalid_limit",
            ErrorKind::InvalidOffset => "invalid_offset",
            ErrorKind::InvalidGroupName => "invalid_group_name",
            ErrorKind::ProtectedGroup => "protected_group",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::DuplicateGroup => "duplicate_group",
            ErrorKind::DuplicateAuthorizationSubject => "duplicate_authorization_subject",
            ErrorKind::Conflict => "conflict",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerError => "server_error",
        }
    }

    /// The HTTP status code a transport layer would map this to. Not used
    /// internally (routing is out of scope) but kept alongside the kind so
    /// handler code has a single source of truth.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidInput
            | ErrorKind::InvalidId
            | ErrorKind::InvalidUuid
            | ErrorKind::InvalidRequest
            | ErrorKind::InvalidLimit
            | ErrorKind::InvalidOffset
            | ErrorKind::InvalidGroupName => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden | ErrorKind::ProtectedGroup => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::DuplicateGroup | ErrorKind::DuplicateAuthorizationSubject | ErrorKind::Conflict => 409,
            ErrorKind::RateLimited => 429,
            ErrorKind::ServerError => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra machine-readable context attached to an error, mirroring the
/// `details: { code?, suggestion?, context? }` shape from the error surface
/// spec.
#[derive(Debug, Clone, Default)]
pub struct ErrorDetails {
    pub code: Option<String>,
    pub suggestion: Option<String>,
    /// Free-form key/value context. `retry_after` (seconds, as a string of
    /// digits) is read from here to populate `Retry-After`.
    pub context: std::collections::BTreeMap<String, String>,
}

impl ErrorDetails {
    pub fn with_retry_after(seconds: u64) -> Self {
        let mut context = std::collections::BTreeMap::new();
        context.insert("retry_after".to_string(), seconds.to_string());
        Self {
            context,
            ..Default::default()
        }
    }

    /// The numeric `retry_after` value, if present and parseable. Per §4.6,
    /// non-numeric values are ignored rather than surfaced.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        self.context.get("retry_after").and_then(|v| v.parse().ok())
    }

    /// Build the `WWW-Authenticate` context for a 401 response (RFC 6750):
    /// `error` and `error_description` are optional quoted auth-params
    /// appended after `realm="tmi"`.
    pub fn with_www_authenticate(error: impl Into<String>, error_description: impl Into<String>) -> Self {
        let mut context = std::collections::BTreeMap::new();
        context.insert("www_authenticate_error".to_string(), error.into());
        context.insert("www_authenticate_error_description".to_string(), error_description.into());
        Self {
            context,
            ..Default::default()
        }
    }

    /// The `WWW-Authenticate` header value for a 401 response (§4.6):
    /// `Bearer realm="tmi"[, error="...", error_description="..."]` with
    /// internal `"` and `\` backslash-escaped per RFC 6750 quoted-string
    /// rules.
    pub fn www_authenticate(&self) -> String {
        let mut value = String::from(r#"Bearer realm="tmi""#);
        if let Some(error) = self.context.get("www_authenticate_error") {
            value.push_str(&format!(r#", error="{}""#, escape_quoted_string(error)));
        }
        if let Some(description) = self.context.get("www_authenticate_error_description") {
            value.push_str(&format!(r#", error_description="{}""#, escape_quoted_string(description)));
        }
        value
    }
}

/// Backslash-escape `"` and `\` so the result is safe inside an RFC 6750
/// quoted-string auth-param.
fn escape_quoted_string(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// The crate-wide error type. `description` is sanitized (see
/// [`crate::validation::sanitize`]) before it is ever handed to a caller
/// outside this crate.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub struct Error {
    pub kind: ErrorKind,
    pub description: String,
    pub details: ErrorDetails,
}

impl Error {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        let description = crate::validation::sanitize::sanitize_message(&description.into());
        Self {
            kind,
            description,
            details: ErrorDetails::default(),
        }
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, what)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self::new(ErrorKind::Unauthorized, msg.clone()).with_details(ErrorDetails::with_www_authenticate("unauthorized", msg))
    }

    pub fn rate_limited(retry_after_seconds: u64) -> Self {
        Self::new(ErrorKind::RateLimited, "rate limit exceeded")
            .with_details(ErrorDetails::with_retry_after(retry_after_seconds))
    }

    pub fn server_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerError, msg)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
