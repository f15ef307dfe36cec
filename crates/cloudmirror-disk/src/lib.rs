//! cloudmirror disk - REST object store adapter
//!
//! Provides async client for:
//! - Resource metadata and paginated folder listing
//! - Folder creation, serialized per directory path
//! - Two-step uploads (request an upload URL, then PUT the bytes)
//! - Deletion, optionally bypassing the trash
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client with transient-failure retry
//! - [`retry`] - Exponential backoff policy and `Retry-After` parsing
//! - [`locks`] - Keyed async locks for directory creation
//! - [`store`] - [`IRemoteStore`](cloudmirror_core::ports::IRemoteStore) implementation

pub mod client;
pub mod locks;
pub mod retry;
pub mod store;

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;

pub use client::DiskClient;
pub use retry::RetryPolicy;
pub use store::DiskRemoteStore;

/// Errors that can occur when communicating with the disk API
#[derive(Debug, Error)]
pub enum DiskError {
    /// The OAuth token is missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The resource already exists or its parent is missing
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Server-provided wait, if any
        retry_after: Option<Duration>,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Any other non-success status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Reading the local file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error body returned by the API alongside 4xx/5xx statuses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    description: Option<String>,
    error: Option<String>,
}

impl DiskError {
    /// Whether retrying the same request may succeed
    ///
    /// Network failures, 429 and 500/502/503/504 are transient. Everything
    /// else is a terminal answer from the server.
    pub fn is_transient(&self) -> bool {
        match self {
            DiskError::TooManyRequests { .. } => true,
            DiskError::ServerError { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            DiskError::NetworkError(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            _ => false,
        }
    }

    /// Server-requested delay before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DiskError::TooManyRequests { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Classifies a status code
    pub fn from_status(status: StatusCode, message: String, retry_after: Option<Duration>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => DiskError::Unauthorized(message),
            StatusCode::FORBIDDEN => DiskError::Forbidden(message),
            StatusCode::NOT_FOUND => DiskError::NotFound(message),
            StatusCode::CONFLICT => DiskError::Conflict(message),
            StatusCode::TOO_MANY_REQUESTS => DiskError::TooManyRequests { retry_after },
            s if s.is_server_error() => DiskError::ServerError {
                status: s.as_u16(),
                message,
            },
            s => DiskError::UnexpectedStatus {
                status: s.as_u16(),
                message,
            },
        }
    }

    /// Consumes an error response, pulling the message out of its JSON body
    pub async fn from_response(response: Response) -> Self {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|v| retry::parse_retry_after(v, retry::DEFAULT_RETRY_AFTER));
        let body = response.text().await.unwrap_or_default();
        Self::from_status(status, error_message(status, &body), retry_after)
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(msg) = parsed.description.or(parsed.message).or(parsed.error) {
            return msg;
        }
    }
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body.trim().to_string()
    }
}
