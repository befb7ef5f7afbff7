//! Error taxonomy for the currency service.

use thiserror::Error;

/// Errors surfaced by the currency service components.
///
/// None of these are process-fatal. Each is absorbed at the component that
/// detects it and reported as a status or log event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Candidate path failed the exposed-path policy.
    #[error("Path rejected by policy: {path}")]
    ValidationRejected { path: String },

    /// Flag resolver or rate source unreachable or malformed.
    #[error("Source unavailable ({source_name}): {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// Conversion requested for a code absent from the rate table.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Converted amount does not fit the units/nanos format.
    #[error("Converted amount out of range for {0}")]
    AmountOutOfRange(String),

    /// No path is currently exposed.
    #[error("not configured")]
    NotConfigured,

    /// Requested path does not match the exposed path.
    #[error("not found")]
    NotFound,

    /// Exposed path could not be read from disk.
    #[error("file not found")]
    FileMissing,
}

impl ServiceError {
    /// Create a source-unavailable error.
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        ServiceError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Check if the failure is retried on the next poll tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::SourceUnavailable { .. })
    }

    /// Get error code for responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::ValidationRejected { .. } => "VALIDATION_REJECTED",
            ServiceError::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            ServiceError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            ServiceError::AmountOutOfRange(_) => "AMOUNT_OUT_OF_RANGE",
            ServiceError::NotConfigured => "NOT_CONFIGURED",
            ServiceError::NotFound => "NOT_FOUND",
            ServiceError::FileMissing => "FILE_MISSING",
        }
    }
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_messages() {
        assert_eq!(ServiceError::NotConfigured.to_string(), "not configured");
        assert_eq!(ServiceError::NotFound.to_string(), "not found");
        assert_eq!(ServiceError::FileMissing.to_string(), "file not found");
    }

    #[test]
    fn test_only_source_failures_retry() {
        assert!(ServiceError::source_unavailable("flagd", "timeout").is_retryable());
        assert!(!ServiceError::UnsupportedCurrency("XYZ".into()).is_retryable());
        assert!(!ServiceError::ValidationRejected { path: "rel".into() }.is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ServiceError::UnsupportedCurrency("XYZ".into()).error_code(),
            "UNSUPPORTED_CURRENCY"
        );
        assert_eq!(ServiceError::FileMissing.error_code(), "FILE_MISSING");
    }
}
