//! Error types for the proxy pipeline.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the request pipeline.
///
/// Every failure is terminal for the request that hit it: the error is
/// rendered as an HTTP response with the failure message as a plain-text
/// body, and nothing is retried or queued.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Origin unreachable or the transport failed mid-request.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The origin declared a gzip body that did not decode.
    #[error("gzip decode failed: {0}")]
    Decompress(#[source] std::io::Error),

    /// Cache directory or file could not be written.
    #[error("cache write failed: {0}")]
    Storage(#[source] std::io::Error),

    /// Cache entry vanished between the existence check and the read.
    #[error("cache entry not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Listen address did not parse.
    #[error("invalid listen address: {0}")]
    Address(String),

    /// Listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Server runtime failure.
    #[error("server error: {0}")]
    Runtime(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::Upstream(_) | ProxyError::Decompress(_) => StatusCode::BAD_GATEWAY,
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::Storage(_)
            | ProxyError::Address(_)
            | ProxyError::Bind { .. }
            | ProxyError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_maps_to_bad_gateway() {
        let response = ProxyError::Upstream("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = ProxyError::NotFound(PathBuf::from("/cache/x")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn storage_maps_to_internal_error() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let response = ProxyError::Storage(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
