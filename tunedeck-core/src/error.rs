//! Error model shared by the transport, cache and accessors.
//!
//! Every failure the data-access layer can produce is normalized into a single
//! [`ApiError`] value: a numeric code, a human-readable message and an optional
//! structured payload. Code `0` means no HTTP response was received; codes
//! `>= 400` come from the HTTP status line or from the response envelope.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Code used when no HTTP response was received.
pub const NETWORK_ERROR_CODE: i64 = 0;

/// Message attached to synthesized network failures.
pub const NETWORK_ERROR_MESSAGE: &str = "network connection failed, please check your network";

/// Message used when a fault carries no message of its own.
pub const UNKNOWN_ERROR_MESSAGE: &str = "unknown error";

pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// ERROR KIND
// ============================================================================

/// Classification of an [`ApiError`], derived purely from its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response was received (connection failure, timeout).
    NetworkFailure,
    /// 401
    AuthFailure,
    /// 403
    PermissionFailure,
    /// 404
    NotFound,
    /// >= 500
    ServerFailure,
    /// Any other code reported by the envelope or the status line.
    BusinessFailure,
}

impl ErrorKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            NETWORK_ERROR_CODE => ErrorKind::NetworkFailure,
            401 => ErrorKind::AuthFailure,
            403 => ErrorKind::PermissionFailure,
            404 => ErrorKind::NotFound,
            c if c >= 500 => ErrorKind::ServerFailure,
            _ => ErrorKind::BusinessFailure,
        }
    }

    /// Transient failures are the only ones worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::NetworkFailure | ErrorKind::ServerFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR
// ============================================================================

/// The single error value surfaced by the data-access layer.
///
/// `Clone` so that callers coalesced onto one in-flight request can each
/// receive the same outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct ApiError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach a structured payload to the error.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = if data.is_null() { None } else { Some(data) };
        self
    }

    /// A failure where no response was received.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(NETWORK_ERROR_CODE, message)
    }

    /// Normalize an arbitrary fault into the error shape.
    ///
    /// A fault that already is an [`ApiError`] keeps its code. Any other
    /// fault carries no code and is reported as code `0`.
    pub fn from_fault(fault: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(err) = fault.downcast_ref::<ApiError>() {
            return err.clone();
        }
        let message = fault.to_string();
        if message.trim().is_empty() {
            Self::network(UNKNOWN_ERROR_MESSAGE)
        } else {
            Self::network(message)
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_code(self.code)
    }

    pub fn is_network(&self) -> bool {
        self.code == NETWORK_ERROR_CODE
    }

    pub fn is_auth(&self) -> bool {
        self.code == 401
    }

    pub fn is_permission(&self) -> bool {
        self.code == 403
    }

    pub fn is_not_found(&self) -> bool {
        self.code == 404
    }

    pub fn is_server(&self) -> bool {
        self.code >= 500
    }

    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

// ============================================================================
// VALIDATION ERRORS
// ============================================================================

/// Flatten field-level validation failures into one display message.
///
/// Produces one line per field, `"<field>: <msg>, <msg>"`, in the order the
/// fields were supplied.
pub fn flatten_validation_errors<I, K, M>(errors: I) -> String
where
    I: IntoIterator<Item = (K, M)>,
    K: AsRef<str>,
    M: IntoIterator,
    M::Item: AsRef<str>,
{
    errors
        .into_iter()
        .map(|(field, messages)| {
            let joined = messages
                .into_iter()
                .map(|m| m.as_ref().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}: {}", field.as_ref(), joined)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
