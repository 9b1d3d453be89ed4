//! Error taxonomy shared by every client-side subsystem.

use thiserror::Error;

use crate::persist::StoreError;

/// Errors raised by the trust and resilience layer.
///
/// Auth and authorization outcomes of page gating are modeled as
/// [`crate::session::AccessOutcome`] decisions, not errors. The
/// `AuthFailure`/`AuthorizationFailure` variants only appear when a caller
/// invokes a backend operation directly without a usable session.
#[derive(Debug, Error)]
pub enum GuardError {
    /// No session, or the backend rejected the credentials.
    #[error("Authentication required: {0}")]
    AuthFailure(String),

    /// Valid session with an insufficient role.
    #[error("Insufficient privileges: {0}")]
    AuthorizationFailure(String),

    /// Bad input shape, size, or type. Rejected before any network call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Local rejection; the call never reached the network.
    #[error("Too many requests. Please try again in a minute.")]
    RateLimitExceeded { limit: u32, period_ms: u64 },

    /// Network or 5xx-class failure, eligible for retry.
    #[error("Backend temporarily unavailable: {0}")]
    TransientBackend(String),

    /// Non-retryable rejection from the backend (4xx-class).
    #[error("Backend rejected request ({status}): {message}")]
    Backend { status: u16, message: String },

    /// Object storage could not accept the asset.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Every upload strategy failed; carries the primary failure's message.
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Client-side persisted state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid runtime configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GuardError {
    /// Only transient backend failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GuardError::TransientBackend(_))
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GuardError::AuthFailure(_) => "auth_failure",
            GuardError::AuthorizationFailure(_) => "authorization_failure",
            GuardError::Validation(_) => "validation",
            GuardError::RateLimitExceeded { .. } => "rate_limited",
            GuardError::TransientBackend(_) => "transient_backend",
            GuardError::Backend { .. } => "backend",
            GuardError::StorageUnavailable(_) => "storage_unavailable",
            GuardError::UploadFailed(_) => "upload_failed",
            GuardError::Store(_) => "store",
            GuardError::Config(_) => "config",
        }
    }
}

/// Input rejected by local validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid file type. Allowed: {}", allowed.join(", "))]
    UnsupportedType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("File too large. Maximum size: {}MB", max_bytes / (1024 * 1024))]
    TooLarge { size: usize, max_bytes: usize },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for guard operations.
pub type GuardResult<T> = Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_retry() {
        assert!(GuardError::TransientBackend("503".into()).is_retryable());
        assert!(!GuardError::RateLimitExceeded { limit: 50, period_ms: 60_000 }.is_retryable());
        assert!(!GuardError::Validation(ValidationError::InvalidInput("x".into())).is_retryable());
        assert!(!GuardError::Backend { status: 400, message: "bad".into() }.is_retryable());
        assert!(!GuardError::StorageUnavailable("bucket".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::TooLarge { size: 3_000_000, max_bytes: 2 * 1024 * 1024 };
        assert_eq!(err.to_string(), "File too large. Maximum size: 2MB");

        let err = ValidationError::UnsupportedType {
            content_type: "text/plain".into(),
            allowed: vec!["image/png".into(), "image/jpeg".into()],
        };
        assert_eq!(err.to_string(), "Invalid file type. Allowed: image/png, image/jpeg");

        let err = GuardError::UploadFailed("Bucket not found".into());
        assert_eq!(err.to_string(), "Upload failed: Bucket not found");
    }
}
