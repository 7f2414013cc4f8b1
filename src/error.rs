//! Error types for matchday

use std::time::Duration;
use thiserror::Error;

/// Result type alias for matchday operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result of a single data source read
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Prewarm aborted: required step `{step}` failed: {source}")]
    PrewarmRequired {
        step: String,
        #[source]
        source: FetchError,
    },

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

/// Errors produced by a data source fetch.
///
/// `Clone` because a deduplicated fetch hands the same outcome to every
/// waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Authentication failed. Run `matchday init` to configure backend credentials.")]
    Unauthorized,

    #[error("Access denied. You don't have permission to read this resource.")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded. Retry after {0:?}")]
    RateLimited(Duration),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// Errors that a retry cannot fix. Retrying these only burns time.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FetchError::NotFound(_)
                | FetchError::Unauthorized
                | FetchError::Forbidden
                | FetchError::BadRequest(_)
                | FetchError::InvalidResponse(_)
        )
    }

    /// Errors worth retrying with backoff (timeouts, throttling, 5xx, network).
    pub fn is_transient(&self) -> bool {
        !self.is_terminal()
    }

    /// Server-provided wait hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited(after) => Some(*after),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Network("Failed to connect to backend".to_string())
        } else if err.is_decode() {
            FetchError::InvalidResponse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Persistence medium errors. Never escape `CacheStore` reads or writes.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache quota exceeded ({needed} bytes needed, limit {limit} bytes)")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("Cache medium unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found. Run `matchday init` to set up.")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Backend URL not configured. Run `matchday init` to set up your backend.")]
    MissingBackend,

    #[error("Viewer not configured. Pass `--viewer <USER_ID>` or run `matchday init`.")]
    MissingViewer,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_terminal() {
        let err = FetchError::NotFound("league abc".to_string());
        assert!(err.is_terminal());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("league abc"));
    }

    #[test]
    fn test_transient_classes() {
        assert!(FetchError::Timeout.is_transient());
        assert!(FetchError::Network("reset".to_string()).is_transient());
        assert!(FetchError::Server("502".to_string()).is_transient());
        assert!(FetchError::RateLimited(Duration::from_secs(2)).is_transient());
    }

    #[test]
    fn test_other_terminal_classes() {
        assert!(FetchError::Unauthorized.is_terminal());
        assert!(FetchError::Forbidden.is_terminal());
        assert!(FetchError::BadRequest("bad filter".to_string()).is_terminal());
        assert!(FetchError::InvalidResponse("missing id".to_string()).is_terminal());
    }

    #[test]
    fn test_retry_after_hint() {
        let err = FetchError::RateLimited(Duration::from_secs(30));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert!(err.to_string().contains("30"));
        assert_eq!(FetchError::Timeout.retry_after(), None);
    }

    #[test]
    fn test_unauthorized_message() {
        assert!(FetchError::Unauthorized.to_string().contains("matchday init"));
    }

    #[test]
    fn test_cache_quota_message() {
        let err = CacheError::QuotaExceeded {
            needed: 2048,
            limit: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn test_prewarm_required_message() {
        let err = Error::PrewarmRequired {
            step: "gw-current".to_string(),
            source: FetchError::Timeout,
        };
        let msg = err.to_string();
        assert!(msg.contains("gw-current"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn test_config_error_missing_viewer() {
        assert!(ConfigError::MissingViewer.to_string().contains("--viewer"));
    }

    #[test]
    fn test_error_from_fetch_error() {
        let err: Error = FetchError::Forbidden.into();
        match err {
            Error::Fetch(FetchError::Forbidden) => (),
            _ => panic!("Expected Error::Fetch(FetchError::Forbidden)"),
        }
    }

    #[test]
    fn test_config_error_from_yaml_error() {
        let yaml_str = "invalid: [yaml: content";
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let config_err: ConfigError = yaml_err.into();

        match config_err {
            ConfigError::ParseError(_) => (),
            _ => panic!("Expected ConfigError::ParseError"),
        }
    }
}
