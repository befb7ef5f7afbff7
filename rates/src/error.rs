//! Rate subsystem error types.

use currency_common::ServiceError;
use thiserror::Error;

/// Errors that can occur while refreshing rates or converting amounts.
#[derive(Debug, Error)]
pub enum RatesError {
    /// Currency code is absent from the current rate table.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Rate source could not be queried.
    #[error("Rate source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// Rate source query did not finish in time.
    #[error("Rate source {source_name} timed out after {timeout_ms}ms")]
    Timeout { source_name: String, timeout_ms: u64 },

    /// A row carried a rate that is not a positive finite number.
    #[error("Malformed rate for {code}: {value:?}")]
    MalformedRow { code: String, value: Option<String> },

    /// Converted value cannot be represented as units and nanos.
    #[error("Converted amount out of range for {0}")]
    AmountOutOfRange(String),

    /// Rate source configuration is unusable.
    #[error("Invalid rate source configuration: {0}")]
    InvalidConfig(String),
}

impl From<sqlx::Error> for RatesError {
    fn from(err: sqlx::Error) -> Self {
        RatesError::SourceUnavailable {
            source_name: "postgres".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<RatesError> for ServiceError {
    fn from(err: RatesError) -> Self {
        let message = err.to_string();
        match err {
            RatesError::UnsupportedCurrency(code) => ServiceError::UnsupportedCurrency(code),
            RatesError::AmountOutOfRange(code) => ServiceError::AmountOutOfRange(code),
            RatesError::SourceUnavailable { source_name, reason } => {
                ServiceError::source_unavailable(source_name, reason)
            }
            RatesError::Timeout { source_name, .. } => {
                ServiceError::source_unavailable(source_name, message)
            }
            RatesError::MalformedRow { .. } | RatesError::InvalidConfig(_) => {
                ServiceError::source_unavailable("rates", message)
            }
        }
    }
}

/// Result type for rate operations.
pub type RatesResult<T> = Result<T, RatesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_into_taxonomy() {
        let err: ServiceError = RatesError::UnsupportedCurrency("XYZ".into()).into();
        assert_eq!(err, ServiceError::UnsupportedCurrency("XYZ".into()));

        let err: ServiceError = RatesError::AmountOutOfRange("JPY".into()).into();
        assert_eq!(err, ServiceError::AmountOutOfRange("JPY".into()));
        assert!(!err.is_retryable());

        let err: ServiceError = RatesError::MalformedRow {
            code: "USD".into(),
            value: Some("abc".into()),
        }
        .into();
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "SOURCE_UNAVAILABLE");
    }
}
