//! Single-file HTTP mirror.
//!
//! Serves exactly the file named by the exposed-path registry, and nothing
//! else. Request paths are percent-decoded, then compared to the exposed
//! path without further normalization. `GET /healthz` always answers
//! `200 ok`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use currency_common::ServiceError;
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::SharedRegistry;

/// Liveness endpoint path.
pub const HEALTH_PATH: &str = "/healthz";

/// Why a mirror request was not served. All map to 404.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MirrorError {
    /// Nothing exposed, or the exposed path no longer passes the policy.
    #[error("not configured")]
    NotConfigured,

    /// Request path differs from the exposed path.
    #[error("not found")]
    NotFound,

    /// Exposed file could not be read.
    #[error("file not found")]
    FileMissing,
}

impl From<MirrorError> for ServiceError {
    fn from(err: MirrorError) -> Self {
        match err {
            MirrorError::NotConfigured => ServiceError::NotConfigured,
            MirrorError::NotFound => ServiceError::NotFound,
            MirrorError::FileMissing => ServiceError::FileMissing,
        }
    }
}

impl IntoResponse for MirrorError {
    fn into_response(self) -> Response {
        (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Request logic of the file mirror.
pub struct FileMirror {
    registry: SharedRegistry,
}

impl FileMirror {
    /// Create a mirror reading from `registry`.
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Decide what to serve for `request_path`.
    ///
    /// The exposed path is re-validated on every request and compared to
    /// the request path as an exact string.
    pub async fn fetch(&self, request_path: &str) -> Result<Vec<u8>, MirrorError> {
        let exposed = self.registry.snapshot();

        let path = match exposed.path() {
            Some(path) if self.registry.policy().is_allowed(path) => path,
            _ => return Err(MirrorError::NotConfigured),
        };

        if request_path != path {
            return Err(MirrorError::NotFound);
        }

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                debug!(path, bytes = bytes.len(), mode = %exposed.mode, "Serving exposed file");
                Ok(bytes)
            }
            Err(e) => {
                warn!(path, error = %e, "Exposed file unreadable");
                Err(MirrorError::FileMissing)
            }
        }
    }
}

/// Build the mirror router.
pub fn build_router(mirror: Arc<FileMirror>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(healthz))
        .fallback(serve_exposed)
        .with_state(mirror)
}

async fn healthz() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "ok")
}

async fn serve_exposed(State(mirror): State<Arc<FileMirror>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let request_path = match urlencoding::decode(uri.path()) {
        Ok(path) => path,
        Err(_) => return MirrorError::NotFound.into_response(),
    };

    match mirror.fetch(&request_path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
