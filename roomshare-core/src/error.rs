//! Error model shared by every client operation.
//!
//! Failures are values: a [`ClientError`] carries a broad [`ErrorKind`] plus the
//! stable `(code, reason)` pair the service (or the client itself) produced.
//! The session keeps the most recent failure as a [`LastError`] snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes.
pub mod codes {
    pub const OK: &str = "OK";
    pub const API_CLIENT_INITIALIZATION_FAILED: &str = "ERR_API_CLIENT_INITIALIZATION_FAILED";
    pub const INVALID_CREDENTIALS: &str = "ERR_INVALID_CREDENTIALS";
    pub const SERVER_HEALTH_STATUS_FAULTY: &str = "ERR_SERVER_HEALTH_STATUS_FAULTY";
    pub const CONNECTION_FAILED: &str = "ERR_CONNECTION_FAILED";
    pub const TIMEOUT: &str = "ERR_TIMEOUT";
    pub const JSON_PARSE_FAILED: &str = "ERR_JSON_PARSE_FAILED";
    pub const INVALID_RESPONSE: &str = "ERR_INVALID_RESPONSE";
    pub const INVALID_REQUEST: &str = "ERR_INVALID_REQUEST";
    pub const UNAUTHORIZED: &str = "ERR_UNAUTHORIZED";
    pub const ROOM_DISCONNECTED: &str = "ERR_ROOM_DISCONNECTED";
    pub const ROOM_ALREADY_CONNECTED: &str = "ERR_ROOM_ALREADY_CONNECTED";
    pub const ROOM_NOT_FOUND: &str = "ERR_ROOM_NOT_FOUND";
    pub const ROOM_NOT_EMPTY: &str = "ERR_ROOM_NOT_EMPTY";
    pub const DEVICE_ALREADY_CONNECTED: &str = "ERR_DEVICE_ALREADY_CONNECTED";
    pub const DEVICE_NOT_CONNECTED: &str = "ERR_DEVICE_NOT_CONNECTED";
    pub const CONTENT_NOT_FOUND: &str = "ERR_CONTENT_NOT_FOUND";
    pub const CONTENT_MISMATCH: &str = "ERR_CONTENT_MISMATCH";
    pub const INVALID_CONTENT_KIND: &str = "ERR_INVALID_CONTENT_KIND";
    pub const COMPRESSION_FAILED: &str = "ERR_COMPRESSION_FAILED";
    pub const DECOMPRESSION_FAILED: &str = "ERR_DECOMPRESSION_FAILED";
}

/// Broad failure category, used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad credentials or unreachable service while creating a session.
    Initialization,
    /// Room or content absent.
    NotFound,
    /// Operation conflicts with current membership or room state.
    Conflict,
    /// Malformed input rejected before (or by) the service.
    Validation,
    /// Network or service-level failure surfaced without interpretation.
    Transport,
}

impl ErrorKind {
    /// Maps a non-success HTTP status to a category.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            404 | 410 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            400 | 413 | 415 | 422 => ErrorKind::Validation,
            401 | 403 => ErrorKind::Initialization,
            _ => ErrorKind::Transport,
        }
    }

    fn fallback_reason(&self) -> &'static str {
        match self {
            ErrorKind::Initialization => "client initialization failed",
            ErrorKind::NotFound => "requested resource was not found",
            ErrorKind::Conflict => "operation conflicts with current state",
            ErrorKind::Validation => "request failed validation",
            ErrorKind::Transport => "service request failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Initialization => write!(f, "initialization"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Transport => write!(f, "transport"),
        }
    }
}

/// Error returned by every fallible client operation.
///
/// The reason is never empty: a blank reason is replaced by a generic
/// description of the kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} ({code})")]
pub struct ClientError {
    kind: ErrorKind,
    code: String,
    reason: String,
}

impl ClientError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut code = code.into();
        if code.is_empty() {
            code = codes::INVALID_RESPONSE.to_string();
        }
        let mut reason = reason.into();
        if reason.trim().is_empty() {
            reason = kind.fallback_reason().to_string();
        }
        Self { kind, code, reason }
    }

    pub fn initialization(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Initialization, code, reason)
    }

    pub fn not_found(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, reason)
    }

    pub fn conflict(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, code, reason)
    }

    pub fn validation(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, code, reason)
    }

    pub fn transport(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, code, reason)
    }

    /// Shorthand for a malformed service response.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::transport(codes::INVALID_RESPONSE, reason)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Re-labels this error as a session initialization failure, keeping code and reason.
    pub fn into_initialization(self) -> Self {
        Self {
            kind: ErrorKind::Initialization,
            ..self
        }
    }

    /// Only transport failures are worth retrying, and only for queries.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transport && self.code != codes::SERVER_HEALTH_STATUS_FAULTY
    }
}

/// Snapshot of the most recent failure recorded on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub code: String,
    pub reason: String,
}

impl LastError {
    /// The sentinel value reported when nothing has failed.
    pub fn none() -> Self {
        Self {
            code: codes::OK.to_string(),
            reason: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.code != codes::OK
    }
}

impl Default for LastError {
    fn default() -> Self {
        Self::none()
    }
}

impl From<&ClientError> for LastError {
    fn from(e: &ClientError) -> Self {
        Self {
            code: e.code.clone(),
            reason: e.reason.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
