//! Structured error taxonomy shared by the registry and the pipeline.
//!
//! Every failure the core reports is tagged with one of a fixed set of
//! [`ErrorCode`]s. `AppError` values are immutable: builders take `&self` and
//! hand back a fresh value, so a stored error can never be changed by a later
//! caller decorating it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Boxed error accepted as a cause.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ============================================================================
// Categories
// ============================================================================

/// Failure category. New kinds of failure get a new variant, never a reuse
/// of an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ConfigNotFound,
    ToolNotFound,
    ToolTimeout,
    InvalidParams,
    UpstreamConnection,
    AuthFailed,
    MessageDelivery,
    Internal,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::ConfigNotFound,
        ErrorCode::ToolNotFound,
        ErrorCode::ToolTimeout,
        ErrorCode::InvalidParams,
        ErrorCode::UpstreamConnection,
        ErrorCode::AuthFailed,
        ErrorCode::MessageDelivery,
        ErrorCode::Internal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigNotFound => "config_not_found",
            ErrorCode::ToolNotFound => "tool_not_found",
            ErrorCode::ToolTimeout => "tool_timeout",
            ErrorCode::InvalidParams => "invalid_params",
            ErrorCode::UpstreamConnection => "upstream_connection",
            ErrorCode::AuthFailed => "auth_failed",
            ErrorCode::MessageDelivery => "message_delivery",
            ErrorCode::Internal => "internal",
        }
    }

    /// Short text that is safe to show to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::ConfigNotFound => "Configuration is missing. Please contact the administrator.",
            ErrorCode::ToolNotFound => "The requested tool is not available.",
            ErrorCode::ToolTimeout => "The tool took too long to respond. Please try again.",
            ErrorCode::InvalidParams => "The request parameters are invalid.",
            ErrorCode::UpstreamConnection => {
                "Unable to reach an upstream service. Please try again later."
            }
            ErrorCode::AuthFailed => "Authentication failed. Please check your credentials.",
            ErrorCode::MessageDelivery => "The message could not be delivered.",
            ErrorCode::Internal => "An unexpected error occurred. Please try again.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// AppError
// ============================================================================

/// Category-tagged error with an optional cause, request id and extra context.
#[derive(Debug, Clone)]
pub struct AppError {
    code: ErrorCode,
    message: String,
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
    request_id: Option<String>,
    extra: BTreeMap<String, Value>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
            request_id: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn wrap(code: ErrorCode, message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::new(code, message).with_cause(cause)
    }

    pub fn config_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigNotFound, message)
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::new(ErrorCode::ToolNotFound, format!("tool not found: {}", name))
    }

    pub fn tool_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ToolTimeout, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamConnection, message)
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthFailed, message)
    }

    pub fn delivery(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MessageDelivery, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    #[must_use]
    pub fn with_cause(&self, cause: impl Into<BoxError>) -> Self {
        let mut next = self.clone();
        next.cause = Some(Arc::from(cause.into()));
        next
    }

    #[must_use]
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.message = message.into();
        next
    }

    #[must_use]
    pub fn with_request_id(&self, request_id: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.request_id = Some(request_id.into());
        next
    }

    /// `Clone` on the extra map copies nested objects and arrays as well, so
    /// the returned value shares no storage with `self`.
    #[must_use]
    pub fn with_extra(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.extra.insert(key.into(), value.into());
        next
    }

    /// Same kind of failure: compares category codes only.
    pub fn is(&self, other: &AppError) -> bool {
        self.code == other.code
    }

    pub fn is_code(&self, code: ErrorCode) -> bool {
        self.code == code
    }

    pub fn user_message(&self) -> &'static str {
        self.code.user_message()
    }

    pub fn summary(&self) -> ErrorSummary {
        ErrorSummary {
            code: self.code,
            message: self.message.clone(),
            request_id: self.request_id.clone(),
            extra: self.extra.clone(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Serializable view of an [`AppError`] (the cause is left out).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

// ============================================================================
// Interrupts and service sentinels
// ============================================================================

/// A call stopped before completing: either its deadline passed or the
/// caller cancelled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupt {
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("operation cancelled")]
    Cancelled,
}

/// Well-known backend failures that get their own user-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("no API key configured")]
    NoApiKey,
    #[error("client not started")]
    ClientNotStarted,
    #[error("session not created")]
    SessionNotCreated,
}

/// Walk `err` and its `source()` chain looking for a `T`.
pub fn find_cause<'a, T>(err: &'a (dyn StdError + 'static)) -> Option<&'a T>
where
    T: StdError + 'static,
{
    std::iter::successors(Some(err), |&e| e.source()).find_map(|e| e.downcast_ref::<T>())
}

/// True if any [`AppError`] in the chain carries `code`.
pub fn has_code(err: &(dyn StdError + 'static), code: ErrorCode) -> bool {
    std::iter::successors(Some(err), |&e| e.source())
        .filter_map(|e| e.downcast_ref::<AppError>())
        .any(|e| e.is_code(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_compares_codes_only() {
        let a = AppError::tool_timeout("slow");
        let b = AppError::wrap(ErrorCode::ToolTimeout, "other", Interrupt::DeadlineExceeded)
            .with_extra("k", 1);
        let c = AppError::internal("slow");
        assert!(a.is(&b));
        assert!(b.is(&a));
        assert!(!a.is(&c));
    }

    #[test]
    fn test_builders_leave_receiver_untouched() {
        let base = AppError::invalid_params("bad").with_extra("nested", json!({"list": [1, 2]}));
        let derived = base
            .with_message("worse")
            .with_request_id("req-1")
            .with_cause(Interrupt::Cancelled)
            .with_extra("more", "x");

        assert_eq!(base.message(), "bad");
        assert!(base.request_id().is_none());
        assert!(base.cause().is_none());
        assert_eq!(base.extra().len(), 1);

        assert_eq!(derived.message(), "worse");
        assert_eq!(derived.request_id(), Some("req-1"));
        assert!(derived.cause().is_some());
        assert_eq!(derived.extra().len(), 2);
        assert_eq!(derived.extra()["nested"], json!({"list": [1, 2]}));
    }

    #[test]
    fn test_source_exposes_cause() {
        let err = AppError::wrap(ErrorCode::ToolTimeout, "timed out", Interrupt::DeadlineExceeded);
        let found = find_cause::<Interrupt>(&err);
        assert_eq!(found, Some(&Interrupt::DeadlineExceeded));
        assert!(has_code(&err, ErrorCode::ToolTimeout));
        assert!(!has_code(&err, ErrorCode::Internal));
    }

    #[test]
    fn test_display_has_code_and_message() {
        let err = AppError::tool_not_found("weather");
        assert_eq!(err.to_string(), "[tool_not_found] tool not found: weather");
    }

    #[test]
    fn test_user_message_is_total() {
        for code in ErrorCode::ALL {
            assert!(!code.user_message().is_empty());
        }
        assert!(ErrorCode::Internal.user_message().contains("unexpected"));
    }

    #[test]
    fn test_summary_serializes_without_empty_fields() {
        let summary = AppError::auth_failed("token expired").summary();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json, json!({"code": "auth_failed", "message": "token expired"}));
    }
}
