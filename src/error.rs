//! Error types for the routing service
//!
//! Stage-level failures never surface here: they are recorded in the pipeline
//! state as `{error: ...}` slots. `RouterError` covers the paths that do fail a
//! request or a process, and maps each onto a JSON-RPC error code for the
//! service surface.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// JSON-RPC code used for operations the router refuses to perform
pub const UNSUPPORTED_OPERATION_CODE: i64 = -32004;
pub const INVALID_PARAMS_CODE: i64 = -32602;
pub const INTERNAL_ERROR_CODE: i64 = -32603;

/// Main error type for router operations
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation { operation: String },

    #[error("LLM provider error: {message}")]
    LlmError { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },

    #[error("Report error: {0}")]
    ReportError(#[from] crate::report::ReportError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl RouterError {
    /// JSON-RPC error code for this error
    pub fn json_rpc_code(&self) -> i64 {
        match self {
            RouterError::UnsupportedOperation { .. } => UNSUPPORTED_OPERATION_CODE,
            RouterError::InvalidInput { .. } => INVALID_PARAMS_CODE,
            _ => INTERNAL_ERROR_CODE,
        }
    }

    /// Display text with secrets redacted, safe to return to callers
    pub fn sanitized_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }

    /// Create unsupported operation error
    pub fn unsupported_operation<S: Into<String>>(operation: S) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
        }
    }

    /// Create LLM error
    pub fn llm_error<S: Into<String>>(message: S) -> Self {
        Self::LlmError {
            message: message.into(),
        }
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport_error<S: Into<String>>(message: S) -> Self {
        Self::TransportError {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("path pattern is valid")
});

const MAX_ERROR_LEN: usize = 500;

/// Sanitize error messages before they leave the process
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = SECRET_PATTERN.replace_all(message, "${1}=***");
    let mut sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_ERROR_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_ERROR_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;
