//! Error types for control-plane operations.
//!
//! Every terminal result of an API call ends up as one [`Error`] variant. Variants
//! that stem from a backend answer carry a [`Failure`] with the endpoint name, HTTP
//! status, decoded result code and a truncated copy of the body so callers can build
//! an actionable message without digging through logs.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Diagnostic context attached to every classified, non-success outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Endpoint name (e.g. `data_center.delete`)
    pub endpoint: String,
    /// HTTP status, absent when no response was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Decoded application result code, if the body carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_code: Option<i64>,
    /// Backend message (`res_message`, error details, or transport error text)
    pub message: String,
    /// Response body truncated for diagnostics
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    /// Number of attempts made before this failure became terminal
    pub attempts: u32,
    /// Whether the retry budget ran out while the failure was still transient
    pub retries_exhausted: bool,
    /// Identifier of the logical operation, shared by all of its attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

impl Failure {
    /// Create a failure for the given endpoint with a message.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            message: message.into(),
            attempts: 1,
            ..Self::default()
        }
    }

    /// Set the HTTP status.
    #[must_use]
    pub const fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Set the decoded result code.
    #[must_use]
    pub const fn with_result_code(mut self, code: i64) -> Self {
        self.result_code = Some(code);
        self
    }

    /// Set the truncated body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.endpoint)?;
        match self.http_status {
            Some(status) => write!(f, " (HTTP {status}")?,
            None => write!(f, " (no response")?,
        }
        if let Some(code) = self.result_code {
            write!(f, ", res {code}")?;
        }
        write!(f, ")")?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if self.retries_exhausted {
            write!(f, " [gave up after {} attempts]", self.attempts)?;
        }
        Ok(())
    }
}

/// Main error type for control-plane operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Network, DNS or timeout failure before any response was received
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Response body did not match the expected shape
    #[error("Failed to decode `{endpoint}` response: {message} (body: {snippet})")]
    Decode {
        /// Endpoint name
        endpoint: String,
        /// What went wrong
        message: String,
        /// Offending bytes, truncated
        snippet: String,
    },

    /// Resource does not exist
    #[error("Not found: {0}")]
    NotFound(Failure),

    /// Mutation collides with existing state
    #[error("Conflict: {0}")]
    Conflict(Failure),

    /// Transient backend failure that was not retried
    #[error("Transient failure: {0}")]
    Transient(Failure),

    /// Backend rejected the request, or retries ran out
    #[error("Request failed: {0}")]
    Permanent(Failure),

    /// Caller deadline expired or the operation was cancelled
    #[error("Deadline exceeded for `{endpoint}` after {attempts} attempt(s)")]
    DeadlineExceeded {
        /// Endpoint name
        endpoint: String,
        /// Attempts that had been issued
        attempts: u32,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Specialized result type for control-plane operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Optional operation ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Backend diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "CONNECTIVITY",
            Self::Decode { .. } => "DECODE_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Transient(_) => "TRANSIENT_FAILURE",
            Self::Permanent(_) => "PERMANENT_FAILURE",
            Self::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Returns true if the retry policy may re-run the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::Transient(_))
    }

    /// Returns the backend diagnostics, if this error came from a classified response.
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::NotFound(failure)
            | Self::Conflict(failure)
            | Self::Transient(failure)
            | Self::Permanent(failure) => Some(failure),
            _ => None,
        }
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        let request_id = self.failure().and_then(|f| f.operation_id.clone());
        let details = self
            .failure()
            .and_then(|failure| serde_json::to_value(failure).ok());

        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                details,
            },
            request_id,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. } | Self::ConfigError(_) | Self::Permanent(_)
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Connectivity(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest(format!("JSON encoding failed: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
