//! Error types for the Unison domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::tool::ParamType;

/// The top-level error type for all Unison operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Filesystem ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{tool_name}: {reason}")]
    ExecutionFailed {
        tool_name: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// Shorthand for an execution failure without an underlying cause.
    pub fn failed(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// The local tool name this error is attributed to, when known.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ExecutionFailed { tool_name, .. } => Some(tool_name),
            Self::Validation(v) => v.tool.as_deref(),
            Self::InvalidArguments(_) => None,
        }
    }
}

/// Caller-supplied arguments violate a tool's declared schema.
///
/// Lists every offending parameter, never just the first one.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Parameter validation failed: {}", join_issues(.issues))]
pub struct ValidationError {
    /// Tool the arguments were meant for.
    pub tool: Option<String>,
    pub issues: Vec<ParameterIssue>,
}

impl ValidationError {
    /// Names of all offending parameters, in schema order.
    pub fn parameters(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.parameter.as_str()).collect()
    }
}

fn join_issues(issues: &[ParameterIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// One parameter that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterIssue {
    pub parameter: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    /// Required, and neither supplied nor defaulted.
    Missing,
    TypeMismatch { expected: ParamType },
    OutOfRange { min: Option<f64>, max: Option<f64> },
    NotInChoices,
}

impl std::fmt::Display for ParameterIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = &self.parameter;
        match &self.kind {
            IssueKind::Missing => write!(f, "missing required parameter '{name}'"),
            IssueKind::TypeMismatch { expected } => {
                write!(f, "parameter '{name}' must be of type {expected}")
            }
            IssueKind::OutOfRange { min, max } => {
                let lo = min.map_or("-inf".to_string(), |v| v.to_string());
                let hi = max.map_or("+inf".to_string(), |v| v.to_string());
                write!(f, "parameter '{name}' must be within [{lo}, {hi}]")
            }
            IssueKind::NotInChoices => write!(f, "parameter '{name}' is not one of the allowed choices"),
        }
    }
}
