//! Flag resolution client.

use std::time::Duration;

use async_trait::async_trait;
use currency_common::ServiceError;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::FlagdConfig;

/// Path of the flagd string evaluation endpoint.
pub const RESOLVE_STRING_PATH: &str = "/flagd.evaluation.v1.Service/ResolveString";

/// Reasons a flag could not be resolved. All mean "no value this tick".
#[derive(Debug, Error)]
pub enum FlagError {
    /// No response (connect failure, timeout, I/O).
    #[error("no response from flag resolver: {0}")]
    Transport(String),

    /// Resolver answered with a non-200 status.
    #[error("flag resolver returned status {0}")]
    Status(u16),

    /// Response body was not JSON.
    #[error("flag resolver returned invalid JSON")]
    InvalidJson,

    /// Response JSON had no string `value` field.
    #[error("flag resolver response missing string 'value' field")]
    MissingValue,

    /// Resolver did not answer within the poller's bound.
    #[error("flag resolver timed out after {0}ms")]
    Timeout(u64),
}

impl From<FlagError> for ServiceError {
    fn from(err: FlagError) -> Self {
        ServiceError::source_unavailable("flagd", err.to_string())
    }
}

/// Trait for resolvers of string-valued flags.
#[async_trait]
pub trait FlagResolver: Send + Sync {
    /// Get the resolver name.
    fn name(&self) -> &str;

    /// Resolve the string value of `flag_key`.
    async fn resolve_string(&self, flag_key: &str) -> Result<String, FlagError>;
}

/// Client for the flagd HTTP evaluation API.
pub struct FlagdClient {
    http: reqwest::Client,
    endpoint: String,
}

impl FlagdClient {
    /// Create a client for `host:port` with the given request timeout.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, FlagError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FlagError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("http://{host}:{port}{RESOLVE_STRING_PATH}"),
        })
    }

    /// Create a client from configuration.
    pub fn from_config(config: &FlagdConfig) -> Result<Self, FlagError> {
        Self::new(&config.host, config.port, config.timeout)
    }

    /// Get the evaluation endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FlagResolver for FlagdClient {
    fn name(&self) -> &str {
        "flagd"
    }

    async fn resolve_string(&self, flag_key: &str) -> Result<String, FlagError> {
        let body = json!({ "flagKey": flag_key, "context": {} });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| FlagError::Transport(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(flag_key, status = status.as_u16(), "Flag resolver returned error status");
            return Err(FlagError::Status(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| FlagError::Transport(e.to_string()))?;
        let value = parse_resolve_response(&text)?;

        debug!(flag_key, value = %value, "Resolved flag");
        Ok(value)
    }
}

/// Extract the string `value` from a ResolveString response body.
pub fn parse_resolve_response(body: &str) -> Result<String, FlagError> {
    let json: Value = serde_json::from_str(body).map_err(|_| FlagError::InvalidJson)?;
    json.get("value")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(FlagError::MissingValue)
}

/// Mock flag resolver for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockFlagResolver {
    value: parking_lot::Mutex<Option<String>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockFlagResolver {
    /// Create a resolver with no value (every call fails).
    pub fn new() -> Self {
        Self {
            value: parking_lot::Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set the resolved value; `None` makes calls fail.
    pub fn set_value(&self, value: Option<&str>) {
        *self.value.lock() = value.map(str::to_string);
    }

    /// Number of resolve calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockFlagResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl FlagResolver for MockFlagResolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn resolve_string(&self, _flag_key: &str) -> Result<String, FlagError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.value
            .lock()
            .clone()
            .ok_or_else(|| FlagError::Transport("mock unavailable".to_string()))
    }
}
