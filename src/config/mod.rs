//! Configuration management for matchday

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::rest::DEFAULT_RATE_LIMIT;
use crate::error::{ConfigError, Result};
use crate::fetch::RetryPolicy;
use crate::prewarm::{DEFAULT_CHAT_BACKLOG, PrewarmOptions};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hosted backend connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,

    /// Default viewer (user ID) to prewarm and rank
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,

    /// User preferences
    #[serde(default)]
    pub preferences: Preferences,

    /// Local cache settings
    #[serde(default)]
    pub cache: CacheSettings,
}

/// Backend connection details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.example.co`
    pub url: String,

    /// Public (anon) API key
    pub api_key: String,

    /// Signed-in user's access token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// User preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    /// Default output format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// How long `prewarm` waits before returning (seconds)
    #[serde(default = "default_prewarm_timeout_secs")]
    pub prewarm_timeout_secs: u64,

    /// Retries after the first attempt of a failed read
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff before the first retry (milliseconds), doubled per retry
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Leagues fetched concurrently during prewarm
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Chat messages prewarmed per league
    #[serde(default = "default_chat_backlog")]
    pub chat_backlog: usize,

    /// Backend requests per second
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
}

fn default_prewarm_timeout_secs() -> u64 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1000
}

fn default_max_concurrent() -> usize {
    4
}

fn default_chat_backlog() -> usize {
    DEFAULT_CHAT_BACKLOG
}

fn default_rate_limit() -> u32 {
    DEFAULT_RATE_LIMIT
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            format: None,
            prewarm_timeout_secs: default_prewarm_timeout_secs(),
            retry_count: default_retry_count(),
            retry_base_ms: default_retry_base_ms(),
            max_concurrent: default_max_concurrent(),
            chat_backlog: default_chat_backlog(),
            rate_limit: default_rate_limit(),
        }
    }
}

/// Local cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Persist to disk; when false every run starts cold
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Override for the cache directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Size cap in megabytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_mb: Option<u64>,
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            dir: None,
            max_size_mb: None,
        }
    }
}

impl CacheSettings {
    pub fn max_bytes(&self) -> Option<usize> {
        self.max_size_mb
            .map(|mb| usize::try_from(mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX))
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".matchday").join("config.yaml"))
    }

    /// `--config` path if given, else the default
    pub fn resolve_path(config_path: Option<&str>) -> Result<PathBuf> {
        match config_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from `--config` or the default path
    pub fn load_at(config_path: Option<&str>) -> Result<Self> {
        Self::load_from(Self::resolve_path(config_path)?)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Save configuration to `--config` or the default path
    pub fn save_at(&self, config_path: Option<&str>) -> Result<()> {
        self.save_to(Self::resolve_path(config_path)?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(&path, contents)?;

        // Set file permissions to 600 on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// The backend section, or an error pointing at `init`.
    pub fn backend(&self) -> Result<&BackendConfig> {
        match &self.backend {
            Some(backend) if !backend.url.trim().is_empty() => Ok(backend),
            _ => Err(ConfigError::MissingBackend.into()),
        }
    }

    /// Viewer from the command line, falling back to the configured one.
    pub fn viewer(&self, cli_override: Option<&str>) -> Result<String> {
        cli_override
            .map(str::to_string)
            .or_else(|| self.viewer_id.clone())
            .ok_or_else(|| ConfigError::MissingViewer.into())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.preferences.retry_count,
            Duration::from_millis(self.preferences.retry_base_ms),
        )
    }

    pub fn prewarm_options(&self) -> PrewarmOptions {
        PrewarmOptions {
            retry: self.retry_policy(),
            max_concurrent: self.preferences.max_concurrent,
            chat_backlog: self.preferences.chat_backlog,
        }
    }

    pub fn prewarm_timeout(&self) -> Duration {
        Duration::from_secs(self.preferences.prewarm_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.backend.is_none());
        assert!(config.viewer_id.is_none());
        assert!(config.cache.enabled);
        assert_eq!(config.preferences.retry_count, 3);
        assert_eq!(config.preferences.chat_backlog, DEFAULT_CHAT_BACKLOG);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str(
            "backend:\n  url: https://db.example.co\n  api_key: anon\npreferences:\n  retry_count: 0\n",
        )
        .unwrap();

        assert_eq!(config.preferences.retry_count, 0);
        assert_eq!(config.preferences.retry_base_ms, 1000);
        assert!(config.cache.enabled);
        assert_eq!(config.retry_policy(), RetryPolicy::new(0, Duration::from_secs(1)));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("config.yaml");
        let config = Config {
            viewer_id: Some("amy".to_string()),
            backend: Some(BackendConfig {
                url: "https://db.example.co".to_string(),
                api_key: "anon".to_string(),
                access_token: None,
            }),
            ..Config::default()
        };

        config.save_to(path.clone()).unwrap();
        let loaded = Config::load_from(path.clone()).unwrap();

        assert_eq!(loaded.viewer_id.as_deref(), Some("amy"));
        assert_eq!(loaded.backend().unwrap().url, "https://db.example.co");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_resolve_path_override() {
        let path = Config::resolve_path(Some("/tmp/custom.yaml")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.yaml"));
    }

    #[test]
    fn test_missing_file() {
        let temp = tempdir().unwrap();
        let err = Config::load_from(temp.path().join("nope.yaml")).unwrap_err();
        assert!(err.to_string().contains("matchday init"));
    }

    #[test]
    fn test_missing_backend() {
        let config = Config::default();
        assert!(config.backend().is_err());
    }

    #[test]
    fn test_viewer_override_wins() {
        let config = Config {
            viewer_id: Some("amy".to_string()),
            ..Config::default()
        };

        assert_eq!(config.viewer(Some("zoe")).unwrap(), "zoe");
        assert_eq!(config.viewer(None).unwrap(), "amy");
        assert!(Config::default().viewer(None).is_err());
    }

    #[test]
    fn test_cache_max_bytes() {
        let settings = CacheSettings {
            max_size_mb: Some(2),
            ..CacheSettings::default()
        };
        assert_eq!(settings.max_bytes(), Some(2 * 1024 * 1024));
        assert_eq!(CacheSettings::default().max_bytes(), None);
    }
}
