//! Disk REST API client
//!
//! Provides a typed HTTP client for the Yandex-Disk-style resource API.
//! Handles the `OAuth` authorization header, JSON deserialization, and
//! retrying transient failures.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cloudmirror_disk::client::DiskClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DiskClient::new("access-token-here");
//! let folder = client.get_resource("/Backup", 100, 0).await?;
//! println!("exists: {}", folder.is_some());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use cloudmirror_core::config::{RemoteConfig, DEFAULT_BASE_URL};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;
use crate::DiskError;

// ============================================================================
// API response types
// ============================================================================

/// Whether a resource is a folder or a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Dir,
    File,
}

/// A file or folder as returned by `GET /resources`
#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    pub name: String,
    /// Full path, e.g. `disk:/Backup/a.txt`
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    /// Server-side modification time
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub custom_properties: Option<CustomProperties>,
    /// Children page, present for folders
    #[serde(rename = "_embedded")]
    pub embedded: Option<ResourceList>,
}

/// User-defined metadata attached to a resource
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomProperties {
    /// Local modification time recorded at upload
    pub mtime: Option<serde_json::Value>,
}

/// One page of folder children
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceList {
    #[serde(default)]
    pub items: Vec<Resource>,
    /// Total number of children across all pages
    pub total: Option<u64>,
}

/// Response of `GET /resources/upload`
#[derive(Debug, Clone, Deserialize)]
pub struct UploadLink {
    pub href: String,
    #[serde(default)]
    pub method: Option<String>,
}

impl Resource {
    /// Modification time to compare against local files
    ///
    /// Prefers the `mtime` custom property written at upload time (full
    /// precision, local clock), then the server `modified` field. A resource
    /// with neither reports the minimum timestamp, so it never matches a
    /// local record.
    pub fn effective_modified(&self) -> DateTime<Utc> {
        let recorded = self
            .custom_properties
            .as_ref()
            .and_then(|p| p.mtime.as_ref())
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        recorded
            .or(self.modified)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ResourceType::Dir
    }
}

/// Result of a folder create call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderStatus {
    Created,
    AlreadyExists,
}

/// Result of a delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    Deleted,
    NotFound,
}

/// Formats a timestamp the way it is stored in `custom_properties.mtime`
pub fn format_mtime(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

// ============================================================================
// DiskClient
// ============================================================================

/// HTTP client for disk API calls
///
/// Wraps `reqwest::Client` with the authorization header, base URL
/// construction and a [`RetryPolicy`]. The client is stateless between
/// calls and can be shared freely across tasks.
#[derive(Clone)]
pub struct DiskClient {
    /// The underlying HTTP client (connection pool is shared by clones)
    client: Client,
    /// Base URL for API requests, without trailing slash
    base_url: String,
    /// OAuth token
    access_token: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for DiskClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl DiskClient {
    /// Creates a new DiskClient against the public endpoint
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    /// Creates a new DiskClient with a custom base URL (useful for testing)
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth token
    /// * `base_url` - Custom base URL for API requests
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Builds a client from the `remote` config section
    ///
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be constructed
    pub fn from_config(
        config: &RemoteConfig,
        access_token: impl Into<String>,
    ) -> Result<Self, DiskError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Replaces the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to base URL (e.g., "/resources")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("OAuth {}", self.access_token))
    }

    // ========================================================================
    // Retry
    // ========================================================================

    /// Sends a request, retrying network errors and transient statuses
    ///
    /// `build` is called once per attempt. Any non-transient response,
    /// including 4xx, is returned as-is so callers can interpret statuses
    /// like 404 and 409 themselves. A transient failure that outlives the
    /// retry budget is returned as an error.
    pub async fn execute<F>(&self, operation: &str, build: F) -> Result<Response, DiskError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match build().send().await {
                Ok(response) if !is_retryable_status(response.status()) => {
                    if attempt > 0 {
                        info!(operation, attempt, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                Ok(response) => DiskError::from_response(response).await,
                Err(e) => DiskError::NetworkError(e),
            };

            if attempt >= self.retry.max_retries || !err.is_transient() {
                if attempt > 0 {
                    warn!(operation, attempts = attempt + 1, error = %err, "Retry limit exhausted");
                }
                return Err(err);
            }

            let delay = self.retry.delay_for(attempt, &err);
            warn!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient error, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    // ========================================================================
    // Resource API
    // ========================================================================

    /// Fetches metadata for `path`, with one page of children for folders
    ///
    /// Returns `Ok(None)` if nothing exists at `path`.
    pub async fn get_resource(
        &self,
        path: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Option<Resource>, DiskError> {
        debug!(path, limit, offset, "GET /resources");
        let response = self
            .execute("get_resource", || {
                self.request(Method::GET, "/resources").query(&[
                    ("path", path.to_string()),
                    ("limit", limit.to_string()),
                    ("offset", offset.to_string()),
                ])
            })
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let resource = response
                    .json::<Resource>()
                    .await
                    .map_err(|e| DiskError::InvalidResponse(format!("resource {path}: {e}")))?;
                Ok(Some(resource))
            }
            _ => Err(DiskError::from_response(response).await),
        }
    }

    /// Creates a single folder; the parent must already exist
    pub async fn create_folder(&self, path: &str) -> Result<FolderStatus, DiskError> {
        debug!(path, "PUT /resources");
        let response = self
            .execute("create_folder", || {
                self.request(Method::PUT, "/resources")
                    .query(&[("path", path)])
            })
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Ok(FolderStatus::AlreadyExists),
            s if s.is_success() => Ok(FolderStatus::Created),
            _ => Err(DiskError::from_response(response).await),
        }
    }

    /// Requests an upload URL for `path`
    ///
    /// With `overwrite = false` the server answers 409 if the path exists,
    /// surfaced as [`DiskError::Conflict`].
    pub async fn upload_link(&self, path: &str, overwrite: bool) -> Result<UploadLink, DiskError> {
        debug!(path, overwrite, "GET /resources/upload");
        let response = self
            .execute("upload_link", || {
                self.request(Method::GET, "/resources/upload").query(&[
                    ("path", path.to_string()),
                    ("overwrite", overwrite.to_string()),
                ])
            })
            .await?;

        if !response.status().is_success() {
            return Err(DiskError::from_response(response).await);
        }
        let link = response
            .json::<UploadLink>()
            .await
            .map_err(|e| DiskError::InvalidResponse(format!("upload link for {path}: {e}")))?;
        url::Url::parse(&link.href)
            .map_err(|e| DiskError::InvalidResponse(format!("upload href '{}': {e}", link.href)))?;
        Ok(link)
    }

    /// Sends file bytes to a URL obtained from [`DiskClient::upload_link`]
    ///
    /// The href is pre-authorized, so no authorization header is sent.
    pub async fn upload_bytes(&self, link: &UploadLink, bytes: Vec<u8>) -> Result<(), DiskError> {
        let method = link
            .method
            .as_deref()
            .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
            .unwrap_or(Method::PUT);
        debug!(size = bytes.len(), %method, "Uploading bytes");

        let response = self
            .execute("upload_bytes", || {
                self.client
                    .request(method.clone(), &link.href)
                    .body(bytes.clone())
            })
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DiskError::from_response(response).await)
        }
    }

    /// Records `modified_at` in the resource's `custom_properties.mtime`
    pub async fn set_mtime(&self, path: &str, modified_at: DateTime<Utc>) -> Result<(), DiskError> {
        let body = serde_json::json!({
            "custom_properties": { "mtime": format_mtime(modified_at) }
        });
        debug!(path, mtime = %format_mtime(modified_at), "PATCH /resources");
        let response = self
            .execute("set_mtime", || {
                self.request(Method::PATCH, "/resources")
                    .query(&[("path", path)])
                    .json(&body)
            })
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DiskError::from_response(response).await)
        }
    }

    /// Deletes the resource at `path` (folders recursively)
    pub async fn delete_resource(
        &self,
        path: &str,
        permanently: bool,
    ) -> Result<DeleteStatus, DiskError> {
        debug!(path, permanently, "DELETE /resources");
        let response = self
            .execute("delete_resource", || {
                let request = self
                    .request(Method::DELETE, "/resources")
                    .query(&[("path", path)]);
                if permanently {
                    request.query(&[("permanently", "true")])
                } else {
                    request
                }
            })
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(DeleteStatus::NotFound),
            s if s.is_success() => Ok(DeleteStatus::Deleted),
            _ => Err(DiskError::from_response(response).await),
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}
