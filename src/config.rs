use anyhow::{anyhow, bail, Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure for the syncer
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Git hosting provider and credentials
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Downstream indexer notification
    #[serde(default)]
    pub reindex: ReindexConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provider configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    /// Provider kind
    #[serde(default = "default_provider_kind")]
    pub kind: String, // "github", "bitbucket"

    /// API token. For Bitbucket, "username:app_password"
    #[serde(default)]
    pub token: String,

    /// Organization (GitHub) or workspace (Bitbucket) name
    #[serde(default)]
    pub org: String,

    /// GitHub REST API base URL
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Bitbucket REST API base URL
    #[serde(default = "default_bitbucket_api_url")]
    pub bitbucket_api_url: String,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Pause between passes
    #[serde(default = "default_interval")]
    pub interval: String, // "3600", "30m", "1h"

    /// Root directory holding one mirror per repository
    #[serde(default = "default_repos_dir")]
    pub repos_dir: String,

    /// Log intended actions without touching disk
    #[serde(default)]
    pub dry_run: bool,

    /// Ordered branch preference; first branch present on the remote wins
    #[serde(default)]
    pub branch_priority: Vec<String>,
}

/// Reindex notification configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReindexConfig {
    /// Endpoint receiving a GET after each pass
    #[serde(default = "default_reindex_url")]
    pub url: String,

    /// Optional bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_reindex_timeout")]
    pub timeout: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "full"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

/// Supported git hosting providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
    Bitbucket,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "bitbucket" => Ok(Self::Bitbucket),
            other => Err(anyhow!("Unsupported git provider: {}", other)),
        }
    }
}

// Default value functions
fn default_provider_kind() -> String {
    "github".to_string()
}
fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_bitbucket_api_url() -> String {
    "https://api.bitbucket.org/2.0".to_string()
}
fn default_interval() -> String {
    "3600".to_string()
}
fn default_repos_dir() -> String {
    "/opengrok/repos".to_string()
}
fn default_reindex_url() -> String {
    "http://opengrok:8000/reindex".to_string()
}
fn default_reindex_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}
fn default_true() -> bool {
    true
}

// Default implementations
impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            token: String::new(),
            org: String::new(),
            github_api_url: default_github_api_url(),
            bitbucket_api_url: default_bitbucket_api_url(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            repos_dir: default_repos_dir(),
            dry_run: false,
            branch_priority: Vec::new(),
        }
    }
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            url: default_reindex_url(),
            token: None,
            timeout: default_reindex_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
        }
    }
}

/// Parse duration strings like "30m", "1h" or plain seconds
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let duration_str = duration_str.trim().to_lowercase();

    let scaled = |value: &str, unit: u64, what: &str| -> Result<u64> {
        value
            .parse::<u64>()
            .with_context(|| format!("Invalid {} value", what))?
            .checked_mul(unit)
            .context("Duration too large")
    };

    let secs = if let Some(value) = duration_str.strip_suffix('s') {
        scaled(value, 1, "seconds")?
    } else if let Some(value) = duration_str.strip_suffix('m') {
        scaled(value, 60, "minutes")?
    } else if let Some(value) = duration_str.strip_suffix('h') {
        scaled(value, 3600, "hours")?
    } else if let Some(value) = duration_str.strip_suffix('d') {
        scaled(value, 86400, "days")?
    } else {
        duration_str
            .parse::<u64>()
            .context("Invalid duration format. Use seconds or a format like '30m', '1h', '2d'")?
    };

    Ok(Duration::from_secs(secs))
}

/// Split a comma-separated branch list, dropping blank entries
pub fn parse_branch_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(String::from)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl Config {
    /// Load configuration from the default location, falling back to built-in defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration file at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("mimir-syncer").join("config.yml"))
    }

    /// Override values from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override values from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GIT_PROVIDER") {
            self.provider.kind = v.to_lowercase();
        }
        if let Some(v) = lookup("API_TOKEN") {
            self.provider.token = v;
        }
        if let Some(v) = lookup("ORG_NAME") {
            self.provider.org = v;
        }
        if let Some(v) = lookup("GITHUB_API_URL") {
            self.provider.github_api_url = v;
        }
        if let Some(v) = lookup("BITBUCKET_API_URL") {
            self.provider.bitbucket_api_url = v;
        }
        if let Some(v) = lookup("SYNC_INTERVAL") {
            self.sync.interval = v;
        }
        if let Some(v) = lookup("REPOS_DIR") {
            self.sync.repos_dir = v;
        }
        if let Some(v) = lookup("DRY_RUN") {
            self.sync.dry_run = parse_flag(&v);
        }
        if let Some(v) = lookup("SYNC_BRANCH_PRIORITY") {
            self.sync.branch_priority = parse_branch_list(&v);
        }
        if let Some(v) = lookup("OPENGROK_REINDEX_URL") {
            self.reindex.url = v;
        }
        if let Some(v) = lookup("OPENGROK_REST_TOKEN") {
            self.reindex.token = Some(v).filter(|t| !t.is_empty());
        }
    }

    /// Expand environment variables and `~` in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.sync.repos_dir = shellexpand::full(&self.sync.repos_dir)
            .context("Failed to expand repos_dir path")?
            .into_owned();

        Ok(())
    }

    /// Fail fast on settings the daemon cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.provider.token.trim().is_empty() {
            bail!("API_TOKEN is required");
        }
        if self.provider.org.trim().is_empty() {
            bail!("ORG_NAME is required");
        }
        self.provider_kind()?;

        let interval = self.sync_interval()?;
        if interval.is_zero() {
            bail!("Sync interval must be greater than zero");
        }
        if self.reindex.timeout == 0 {
            bail!("Reindex timeout must be greater than zero");
        }

        reqwest::Url::parse(&self.reindex.url)
            .with_context(|| format!("Invalid reindex URL: {}", self.reindex.url))?;

        Ok(())
    }

    pub fn provider_kind(&self) -> Result<ProviderKind> {
        self.provider.kind.parse()
    }

    pub fn sync_interval(&self) -> Result<Duration> {
        parse_duration(&self.sync.interval)
            .with_context(|| format!("Invalid sync interval: {}", self.sync.interval))
    }

    pub fn repos_dir(&self) -> PathBuf {
        PathBuf::from(&self.sync.repos_dir)
    }

    pub fn reindex_timeout(&self) -> Duration {
        Duration::from_secs(self.reindex.timeout)
    }
}
