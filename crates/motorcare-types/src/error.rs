//! Normalized error types.
//!
//! Every failure path in the access layer (HTTP 4xx/5xx, timeout, offline,
//! malformed body) resolves to an [`ApiError`] so callers can pattern-match
//! one shape instead of juggling transport exceptions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status code used for "no network path" failures.
pub const STATUS_OFFLINE: u16 = 0;
/// Status code used for request timeouts.
pub const STATUS_TIMEOUT: u16 = 408;

/// Server error codes that mean the account behind the session no longer
/// exists. A refresh that fails with one of these must not be retried.
const ACCOUNT_GONE_CODES: [&str; 3] = ["ACCOUNT_DELETED", "ACCOUNT_NOT_FOUND", "USER_NOT_FOUND"];

/// The uniform error shape every remote call failure is converted into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Always `false`; kept so the error envelope mirrors the wire format.
    #[serde(default)]
    pub success: bool,
    /// Status string, e.g. `"error"`, `"timeout"`, `"network_error"`.
    #[serde(default)]
    pub status: String,
    /// Displayable message. Never empty.
    #[serde(default)]
    pub message: String,
    /// HTTP status code, `408` for timeouts, `0` for offline.
    #[serde(default)]
    pub status_code: u16,
    /// Structured detail from the server, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

/// Machine-readable error detail inside the error envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status_code: u16, status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.into(),
            message: message.into(),
            status_code,
            error: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error = Some(ErrorDetail {
            code: code.into(),
            details: None,
        });
        self
    }

    /// Request timed out before the server answered.
    pub fn timeout() -> Self {
        Self::new(
            STATUS_TIMEOUT,
            "timeout",
            "Request timed out. Please try again.",
        )
    }

    /// No network path to the server.
    pub fn offline() -> Self {
        Self::new(
            STATUS_OFFLINE,
            "network_error",
            "Network unavailable. Please check your connection.",
        )
    }

    /// Catch-all for failures with no better classification.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(500, "error", message.into())
    }

    /// Build from a non-2xx response body.
    ///
    /// Uses the server's error envelope when it parses, otherwise falls back
    /// to a generic shape carrying the actual status code.
    pub fn from_body(status_code: u16, body: &serde_json::Value) -> Self {
        if let Ok(mut parsed) = serde_json::from_value::<ApiError>(body.clone()) {
            parsed.success = false;
            parsed.status_code = status_code;
            if parsed.status.is_empty() {
                parsed.status = "error".to_string();
            }
            if parsed.message.is_empty() {
                parsed.message = format!("Request failed with status {}", status_code);
            }
            return parsed;
        }
        Self::new(
            status_code,
            "error",
            format!("Request failed with status {}", status_code),
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code == 401
    }

    /// Transient failures worth a client-side retry: offline, timeout, 5xx.
    /// 401 is owned by the refresh path and other 4xx are final.
    pub fn is_transient(&self) -> bool {
        self.status_code == STATUS_OFFLINE
            || self.status_code == STATUS_TIMEOUT
            || self.status_code >= 500
    }

    /// Whether the server signalled that the account no longer exists.
    pub fn is_account_gone(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| ACCOUNT_GONE_CODES.contains(&e.code.as_str()))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status {})", self.message, self.status_code)
    }
}

impl std::error::Error for ApiError {}

/// Failures from the token persistence backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure with message.
    #[error("Storage backend error: {0}")]
    Backend(String),
}
