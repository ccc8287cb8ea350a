//! Error types for opsdiag
//!
//! Cluster failures are classified into a small taxonomy so that callers can
//! decide what is fatal. Check evaluators never propagate these; they turn them
//! into evaluation records. Only [`OpsError::UserError`] and catastrophic
//! collector failures reach the process boundary.

use thiserror::Error;

/// Main error type for opsdiag
#[derive(Debug, Error)]
pub enum OpsError {
    /// API discovery says the group/version (or kind) is absent
    #[error("Resource kind not found: {0}")]
    KindNotFound(String),

    /// Insufficient permissions on a specific resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Timeout, 5xx, connection reset; retryable
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Malformed server payload
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Unknown service, unknown kind for a service, conflicting flags
    #[error("{0}")]
    UserError(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timeout waiting for {0}")]
    Timeout(String),
}

impl OpsError {
    /// Whether a single local retry is worthwhile
    pub fn is_transient(&self) -> bool {
        matches!(self, OpsError::Transient(_) | OpsError::Timeout(_))
    }

    /// Process exit code for this error when it reaches `main`
    pub fn exit_code(&self) -> i32 {
        match self {
            OpsError::UserError(_) | OpsError::KindNotFound(_) | OpsError::Config(_) => 2,
            _ => 1,
        }
    }

    /// Classify a kube client error into the taxonomy
    pub fn classify(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => match resp.code {
                404 => OpsError::KindNotFound(resp.message),
                401 | 403 => OpsError::Forbidden(resp.message),
                408 | 429 => OpsError::Transient(resp.message),
                code if code >= 500 => OpsError::Transient(format!("{} ({})", resp.message, code)),
                _ => OpsError::InvalidResponse(format!("{} ({})", resp.message, resp.code)),
            },
            kube::Error::SerdeError(e) => OpsError::InvalidResponse(e.to_string()),
            kube::Error::FromUtf8(e) => OpsError::InvalidResponse(e.to_string()),
            kube::Error::HyperError(e) => OpsError::Transient(e.to_string()),
            kube::Error::Service(e) => OpsError::Transient(e.to_string()),
            other => OpsError::Kube(other),
        }
    }
}

impl From<kube::Error> for OpsError {
    fn from(e: kube::Error) -> Self {
        OpsError::classify(e)
    }
}

impl From<serde_json::Error> for OpsError {
    fn from(e: serde_json::Error) -> Self {
        OpsError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for OpsError {
    fn from(e: serde_yaml::Error) -> Self {
        OpsError::Serialization(e.to_string())
    }
}

/// Result type alias for opsdiag
pub type Result<T> = std::result::Result<T, OpsError>;
