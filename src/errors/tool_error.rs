use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidParams,
    NotFound,
    Timeout,
    Internal,
}

impl ToolErrorKind {
    fn code(self) -> &'static str {
        match self {
            ToolErrorKind::InvalidParams => "INVALID_PARAMS",
            ToolErrorKind::NotFound => "NOT_FOUND",
            ToolErrorKind::Timeout => "TIMEOUT",
            ToolErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Misuse the caller has to fix: unknown tool or action, wrong argument
/// type, broken wiring. Upstream failures are reported as data instead.
#[derive(Debug, Clone, Serialize, Error)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl ToolError {
    fn of(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code().to_string(),
            message: message.into(),
            hint: None,
            details: None,
            retryable: kind == ToolErrorKind::Timeout,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::of(ToolErrorKind::InvalidParams, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::of(ToolErrorKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::of(ToolErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::of(ToolErrorKind::Internal, message)
    }

    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        Self {
            hint: Some(hint.into()),
            ..self
        }
    }

    pub fn with_details(self, details: Value) -> Self {
        Self {
            details: Some(details),
            ..self
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::internal(format!("stdio: {}", err))
    }
}
