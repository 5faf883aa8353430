//! Configuration management for Castlane

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CLAIM_TIMEOUT_SECS: u64 = 900;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub twitter: Option<TwitterConfig>,
    pub linkedin: Option<LinkedInConfig>,
    pub facebook: Option<FacebookConfig>,
    pub instagram: Option<InstagramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between discovery passes
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Seconds after which an unfinished claim is considered abandoned
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL_SECS,
            claim_timeout: DEFAULT_CLAIM_TIMEOUT_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.max(1))
    }

    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout)
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_claim_timeout() -> u64 {
    DEFAULT_CLAIM_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    /// OAuth 2.0 user-context bearer token
    pub bearer_token: Option<String>,
    #[serde(default = "default_twitter_base")]
    pub api_base: String,
}

/// How strictly a LinkedIn author URN is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrnPolicy {
    /// Repair recognisable mistakes and treat a bare id as a person id
    #[default]
    Lenient,
    /// Only accept well-formed person, member, organization or company URNs
    Strict,
}

impl std::str::FromStr for UrnPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(UrnPolicy::Lenient),
            "strict" => Ok(UrnPolicy::Strict),
            other => Err(ConfigError::InvalidValue {
                field: "linkedin.urn_policy".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    pub access_token: Option<String>,
    pub author_urn: Option<String>,
    #[serde(default)]
    pub urn_policy: UrnPolicy,
    #[serde(default = "default_linkedin_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub page_id: Option<String>,
    /// Page-scoped token, preferred when present
    pub page_access_token: Option<String>,
    /// General token used when no page token is configured
    pub access_token: Option<String>,
    #[serde(default = "default_graph_base")]
    pub api_base: String,
    #[serde(default = "default_graph_version")]
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    pub access_token: Option<String>,
    pub business_account_id: Option<String>,
    #[serde(default = "default_graph_base")]
    pub api_base: String,
    #[serde(default = "default_graph_version")]
    pub api_version: String,
}

fn default_twitter_base() -> String {
    "https://api.twitter.com".to_string()
}

fn default_linkedin_base() -> String {
    "https://api.linkedin.com".to_string()
}

fn default_graph_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_version() -> String {
    "v18.0".to_string()
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file is not an error: the defaults are used and the
    /// environment supplies credentials.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            tracing::debug!(path = %config_path.display(), "config file not found, using defaults");
            Self::default_config()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/castlane/castlane.db".to_string(),
            },
            scheduler: SchedulerConfig::default(),
            twitter: None,
            linkedin: None,
            facebook: None,
            instagram: None,
        }
    }

    /// Let environment variables override file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("CASTLANE_DB_PATH") {
            self.database.path = path;
        }

        if let Some(token) = get("TWITTER_BEARER_TOKEN") {
            self.twitter.get_or_insert_with(TwitterConfig::default).bearer_token = Some(token);
        }

        if let Some(token) = get("LINKEDIN_ACCESS_TOKEN") {
            self.linkedin.get_or_insert_with(LinkedInConfig::default).access_token = Some(token);
        }
        if let Some(urn) = get("LINKEDIN_AUTHOR_URN") {
            self.linkedin.get_or_insert_with(LinkedInConfig::default).author_urn = Some(urn);
        }

        if let Some(page_id) = get("FACEBOOK_PAGE_ID") {
            self.facebook.get_or_insert_with(FacebookConfig::default).page_id = Some(page_id);
        }
        if let Some(token) = get("FACEBOOK_PAGE_ACCESS_TOKEN") {
            self.facebook
                .get_or_insert_with(FacebookConfig::default)
                .page_access_token = Some(token);
        }
        if let Some(token) = get("FACEBOOK_ACCESS_TOKEN") {
            self.facebook.get_or_insert_with(FacebookConfig::default).access_token = Some(token);
        }

        if let Some(token) = get("INSTAGRAM_ACCESS_TOKEN") {
            self.instagram
                .get_or_insert_with(InstagramConfig::default)
                .access_token = Some(token);
        }
        if let Some(id) = get("INSTAGRAM_BUSINESS_ACCOUNT_ID") {
            self.instagram
                .get_or_insert_with(InstagramConfig::default)
                .business_account_id = Some(id);
        }
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            api_base: default_twitter_base(),
        }
    }
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            author_urn: None,
            urn_policy: UrnPolicy::default(),
            api_base: default_linkedin_base(),
        }
    }
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            page_id: None,
            page_access_token: None,
            access_token: None,
            api_base: default_graph_base(),
            api_version: default_graph_version(),
        }
    }
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            business_account_id: None,
            api_base: default_graph_base(),
            api_version: default_graph_version(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CASTLANE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("castlane").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("castlane"))
}
