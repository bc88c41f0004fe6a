//! Configuration management for the agent inbox

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::models::{Inbox, MAX_SEARCH_LIMIT, Scope};
use crate::error::{ConfigError, Result};
use crate::sync::{CircuitBreakerConfig, PrefetchConfig, RetryPolicy, SyncOptions};

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "AGENT_INBOX_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bearer token for the deployments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Deployment ID to base URL
    #[serde(default)]
    pub deployments: BTreeMap<String, String>,

    /// Agent (assistant) used when `--agent` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_deployment: Option<String>,

    /// User preferences
    #[serde(default)]
    pub preferences: Preferences,

    /// Cache, retry and prefetch tuning
    #[serde(default)]
    pub sync: SyncSettings,
}

/// User preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Inbox shown by `threads list`
    #[serde(default)]
    pub inbox: Inbox,

    /// Page size for `threads list`
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            inbox: Inbox::default(),
            limit: default_limit(),
        }
    }
}

/// Sync layer settings as stored on disk, in plain seconds and milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub list_ttl_secs: u64,
    pub list_stale_after_secs: u64,
    pub state_ttl_secs: u64,
    pub state_cache_max_entries: usize,
    pub concurrency: usize,
    pub state_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub breaker_threshold: u32,
    pub breaker_window_secs: u64,
    pub prefetch_recent: usize,
    pub prefetch_today: usize,
    pub prefetch_stagger_ms: u64,
    pub hover_debounce_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            list_ttl_secs: 300,
            list_stale_after_secs: 60,
            state_ttl_secs: 30,
            state_cache_max_entries: 500,
            concurrency: 5,
            state_timeout_secs: 15,
            search_timeout_secs: 20,
            max_retries: 2,
            backoff_base_ms: 1000,
            breaker_threshold: 3,
            breaker_window_secs: 60,
            prefetch_recent: 3,
            prefetch_today: 5,
            prefetch_stagger_ms: 100,
            hover_debounce_ms: 200,
        }
    }
}

impl SyncSettings {
    pub fn to_options(&self) -> SyncOptions {
        let backoff = Duration::from_millis(self.backoff_base_ms);
        SyncOptions {
            list_ttl: Duration::from_secs(self.list_ttl_secs),
            list_stale_after: Duration::from_secs(self.list_stale_after_secs),
            state_ttl: Duration::from_secs(self.state_ttl_secs),
            state_cache_max_entries: self.state_cache_max_entries,
            concurrency: self.concurrency,
            state_policy: RetryPolicy::new(
                Duration::from_secs(self.state_timeout_secs),
                self.max_retries,
                backoff,
            ),
            search_policy: RetryPolicy::new(
                Duration::from_secs(self.search_timeout_secs),
                self.max_retries,
                backoff,
            ),
            breaker: CircuitBreakerConfig::new()
                .with_failure_threshold(self.breaker_threshold)
                .with_window(Duration::from_secs(self.breaker_window_secs)),
            prefetch: PrefetchConfig {
                recent: self.prefetch_recent,
                today: self.prefetch_today,
                stagger: Duration::from_millis(self.prefetch_stagger_ms),
                hover_debounce: Duration::from_millis(self.hover_debounce_ms),
            },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("sync.concurrency must be at least 1".into()).into());
        }
        if self.breaker_threshold == 0 {
            return Err(
                ConfigError::Invalid("sync.breaker_threshold must be at least 1".into()).into(),
            );
        }
        if self.list_stale_after_secs > self.list_ttl_secs {
            return Err(ConfigError::Invalid(
                "sync.list_stale_after_secs cannot exceed sync.list_ttl_secs".into(),
            )
            .into());
        }
        Ok(())
    }
}

/// Where a command talks to: the scope plus the deployment's base URL
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub scope: Scope,
    pub base_url: String,
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".agent-inbox").join("config.yaml"))
    }

    /// Explicit path, then `AGENT_INBOX_CONFIG`, then the default location.
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => match std::env::var(CONFIG_ENV) {
                Ok(p) if !p.is_empty() => Ok(PathBuf::from(p)),
                _ => Self::default_path(),
            },
        }
    }

    pub fn load_at(path: Option<&str>) -> Result<Self> {
        Self::load_from(Self::resolve_path(path)?)
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(Self::resolve_path(path)?)
    }

    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;
        std::fs::write(&path, contents)?;

        // Holds a bearer token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.preferences.limit == 0 || self.preferences.limit > MAX_SEARCH_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "preferences.limit must be between 1 and {}",
                MAX_SEARCH_LIMIT
            ))
            .into());
        }
        self.sync.validate()
    }

    /// The access token, or an error telling the user how to set one.
    pub fn require_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::MissingToken.into())
    }

    /// Resolve agent and deployment, preferring the overrides.
    pub fn resolve_target(
        &self,
        agent_override: Option<&str>,
        deployment_override: Option<&str>,
    ) -> Result<Target> {
        let agent = agent_override
            .or(self.default_agent.as_deref())
            .ok_or(ConfigError::MissingAgent)?;
        let deployment = deployment_override
            .or(self.default_deployment.as_deref())
            .ok_or(ConfigError::MissingDeployment)?;
        let base_url = self
            .deployments
            .get(deployment)
            .ok_or_else(|| ConfigError::UnknownDeployment(deployment.to_string()))?;

        Ok(Target {
            scope: Scope::new(agent, deployment),
            base_url: base_url.clone(),
        })
    }
}
