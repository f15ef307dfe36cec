//! Configuration module for cloudmirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//!
//! Configuration is read once at process start. Required keys have no serde
//! default, so a file missing any of them fails to load at all; the remaining
//! checks happen in [`Config::validate`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::RemotePath;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for cloudmirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sync: SyncConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Which local entries take part in synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Regular files only.
    #[default]
    Files,
    /// Files and directories (directories get their own record).
    All,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Files => write!(f, "files"),
            SyncMode::All => write!(f, "all"),
        }
    }
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Local directory tree to mirror.
    pub local_folder: PathBuf,
    /// Name of the folder in the cloud that receives the mirror.
    pub cloud_folder_name: String,
    /// Seconds to sleep between sync cycles.
    pub sync_period: u64,
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// Maximum number of actions executed in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Directory names pruned from the local scan.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
}

/// Credentials for the remote store.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// OAuth token sent with every request.
    pub access_token: String,
}

// The token must never end up in a log line.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Remote API transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the disk REST API.
    pub base_url: String,
    /// Retries for transient failures (server errors, resets, 429).
    pub max_retries: u32,
    /// First backoff delay; doubled on every retry.
    pub retry_base_delay_ms: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Items requested per listing page.
    pub page_size: u32,
    /// Bypass the remote trash when deleting.
    pub permanent_delete: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Path to the log file (appended to).
    pub file: PathBuf,
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default number of parallel workers.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default Yandex Disk REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net/v1/disk";

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_ignore_dirs() -> Vec<String> {
    vec![
        ".git".to_string(),
        ".vscode".to_string(),
        "__pycache__".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 5,
            retry_base_delay_ms: 1000,
            request_timeout_secs: 60,
            page_size: 100,
            permanent_delete: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.sync_period"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors raised while loading configuration. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed YAML or a required key is missing
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Parse configuration from a YAML file at `path`.
    ///
    /// Does not validate; see [`Config::load_validated`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Load and validate in one step.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cloudmirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cloudmirror")
            .join("config.yaml")
    }

    /// Platform-appropriate default log file location.
    pub fn default_log_file() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("cloudmirror")
            .join("cloudmirror.log")
    }

    /// Remote root derived from `sync.cloud_folder_name`.
    ///
    /// Only fails for names that [`Config::validate`] rejects.
    pub fn remote_root(&self) -> Result<RemotePath, crate::domain::DomainError> {
        RemotePath::from_folder_name(&self.sync.cloud_folder_name)
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for `sync.concurrency`.
const MAX_CONCURRENCY: usize = 64;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if !self.sync.local_folder.is_dir() {
            errors.push(ValidationError {
                field: "sync.local_folder".into(),
                message: format!(
                    "directory does not exist: {}",
                    self.sync.local_folder.display()
                ),
            });
        }
        if self.sync.cloud_folder_name.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.cloud_folder_name".into(),
                message: "must not be empty".into(),
            });
        } else if let Err(err) = self.remote_root() {
            errors.push(ValidationError {
                field: "sync.cloud_folder_name".into(),
                message: err.to_string(),
            });
        }
        if self.sync.sync_period == 0 {
            errors.push(ValidationError {
                field: "sync.sync_period".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.concurrency == 0 || self.sync.concurrency > MAX_CONCURRENCY {
            errors.push(ValidationError {
                field: "sync.concurrency".into(),
                message: format!("must be in range 1..={MAX_CONCURRENCY}"),
            });
        }
        if let Some(bad) = self
            .sync
            .ignore_dirs
            .iter()
            .find(|d| d.is_empty() || d.contains('/') || d.contains('\\'))
        {
            errors.push(ValidationError {
                field: "sync.ignore_dirs".into(),
                message: format!("entries must be plain directory names, got '{bad}'"),
            });
        }

        // --- auth ---
        if self.auth.access_token.trim().is_empty() {
            errors.push(ValidationError {
                field: "auth.access_token".into(),
                message: "must not be empty".into(),
            });
        }

        // --- remote ---
        if !(self.remote.base_url.starts_with("http://")
            || self.remote.base_url.starts_with("https://"))
        {
            errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: format!("must be an http(s) URL, got '{}'", self.remote.base_url),
            });
        }
        if self.remote.max_retries > 10 {
            errors.push(ValidationError {
                field: "remote.max_retries".into(),
                message: "must not exceed 10".into(),
            });
        }
        if self.remote.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.remote.page_size == 0 || self.remote.page_size > 1000 {
            errors.push(ValidationError {
                field: "remote.page_size".into(),
                message: "must be in range 1..=1000".into(),
            });
        }

        // --- logging ---
        if self.logging.file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "logging.file".into(),
                message: "must not be empty".into(),
            });
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Takes the required values up front; everything else starts at its
/// default and can be overridden.
///
/// # Example
///
/// ```rust,no_run
/// use cloudmirror_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new(PathBuf::from("/home/user/docs"), "Backup", "token")
///     .sync_period(60)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(
        local_folder: PathBuf,
        cloud_folder_name: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            config: Config {
                sync: SyncConfig {
                    local_folder,
                    cloud_folder_name: cloud_folder_name.into(),
                    sync_period: 60,
                    sync_mode: SyncMode::default(),
                    concurrency: DEFAULT_CONCURRENCY,
                    ignore_dirs: default_ignore_dirs(),
                },
                auth: AuthConfig {
                    access_token: access_token.into(),
                },
                remote: RemoteConfig::default(),
                logging: LoggingConfig {
                    file: Config::default_log_file(),
                    level: default_log_level(),
                },
            },
        }
    }

    // --- sync ---

    pub fn sync_period(mut self, seconds: u64) -> Self {
        self.config.sync.sync_period = seconds;
        self
    }

    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.config.sync.sync_mode = mode;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.sync.concurrency = n;
        self
    }

    pub fn ignore_dirs(mut self, dirs: Vec<String>) -> Self {
        self.config.sync.ignore_dirs = dirs;
        self
    }

    // --- remote ---

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn remote_max_retries(mut self, n: u32) -> Self {
        self.config.remote.max_retries = n;
        self
    }

    pub fn remote_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.remote.retry_base_delay_ms = ms;
        self
    }

    pub fn remote_page_size(mut self, n: u32) -> Self {
        self.config.remote.page_size = n;
        self
    }

    pub fn remote_permanent_delete(mut self, permanent: bool) -> Self {
        self.config.remote.permanent_delete = permanent;
        self
    }

    // --- logging ---

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = file;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
