//! Error types for the agent inbox

use std::time::Duration;
use thiserror::Error;

/// Result type alias for command-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for upstream calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Result type alias for the synchronization layer
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Top-level error type for the application
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

impl Error {
    /// Whether this error reflects an intentional abandonment that should not be shown.
    pub fn is_silent(&self) -> bool {
        matches!(self, Error::Sync(SyncError::Cancelled))
    }
}

/// Upstream orchestration service errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(dead_code)]
pub enum ApiError {
    #[error("Authentication failed. Run `agent-inbox init` to set your access token.")]
    Unauthorized,

    #[error("Access denied. You don't have permission to access this resource.")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded. Retry after {0:?}")]
    RateLimit(Duration),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to API".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Outcomes of the synchronization layer that are not a successful value.
///
/// Cloneable so a single in-flight result can be handed to every waiting caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Upstream(#[from] ApiError),

    #[error("Upstream is degraded; request skipped")]
    Degraded,

    #[error("Unexpected response shape: {0}")]
    InvalidSchema(String),

    #[error("Invalid thread filter: {0}")]
    InvalidFilter(String),
}

impl SyncError {
    /// Whether this failure should count toward the circuit breaker.
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, SyncError::Timeout(_) | SyncError::Upstream(_))
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Client errors (bad credentials, missing thread, rejected request) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Timeout(_) => true,
            SyncError::Upstream(api) => !matches!(
                api,
                ApiError::Unauthorized
                    | ApiError::Forbidden
                    | ApiError::NotFound(_)
                    | ApiError::BadRequest(_)
            ),
            _ => false,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found. Run `agent-inbox init` to set up.")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Access token not configured. Run `agent-inbox init` or pass --token.")]
    MissingToken,

    #[error("Agent not configured. Pass --agent or set default_agent in the config.")]
    MissingAgent,

    #[error("Deployment not configured. Pass --deployment or set default_deployment.")]
    MissingDeployment,

    #[error("Unknown deployment '{0}'. Add it under `deployments` in the config.")]
    UnknownDeployment(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Local cache storage errors.
///
/// These never escape the cache layer; they are logged and the operation degrades to
/// memory-only behaviour.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
