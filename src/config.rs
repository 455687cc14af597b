//! Configuration for zoo, read from `.zoo/zoo.toml`.
//!
//! Settings are layered file → environment → CLI. Every section has
//! defaults, so a missing file is a valid configuration.
//!
//! ```toml
//! [database]
//! path = ".zoo/zoo.db"
//!
//! [slack]
//! enabled = true
//! api_url = "https://slack.com/api"
//! timeout_secs = 10
//!
//! [site]
//! base_url = "https://zoo.example.com"
//!
//! [logging]
//! format = "json"
//! filter = "zoo=debug"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auditing::slack::DEFAULT_SLACK_API_URL;
use crate::observability::LogFormat;

pub const ZOO_DIR: &str = ".zoo";
pub const CONFIG_FILE: &str = "zoo.toml";

pub const ENV_SLACK_TOKEN: &str = "SLACK_API_TOKEN";
pub const ENV_SLACK_API_URL: &str = "SLACK_API_URL";
pub const ENV_BASE_URL: &str = "ZOO_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Relative paths resolve against the project directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    Path::new(ZOO_DIR).join("zoo.db")
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackSection {
    #[serde(default = "default_slack_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Prefer `SLACK_API_TOKEN` over committing a token here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_slack_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for SlackSection {
    fn default() -> Self {
        Self {
            enabled: default_slack_enabled(),
            api_url: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// The complete zoo.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ZooToml {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub slack: SlackSection,
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl ZooToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse zoo.toml")
    }

    /// Load `zoo.toml` from `zoo_dir`, or defaults when it does not exist.
    pub fn load_or_default(zoo_dir: &Path) -> Result<Self> {
        let config_path = zoo_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize zoo.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Slack token (env → file). Blank values count as unset.
    pub fn slack_token(&self) -> Option<String> {
        self.slack_token_with(|key| std::env::var(key).ok())
    }

    fn slack_token_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        env(ENV_SLACK_TOKEN)
            .or_else(|| self.slack.token.clone())
            .filter(|t| !t.trim().is_empty())
    }

    /// Slack API base URL (env → file → default).
    pub fn slack_api_url(&self) -> String {
        self.slack_api_url_with(|key| std::env::var(key).ok())
    }

    fn slack_api_url_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        env(ENV_SLACK_API_URL)
            .or_else(|| self.slack.api_url.clone())
            .unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string())
    }

    /// Site base URL used in report links (env → file → default).
    pub fn base_url(&self) -> String {
        self.base_url_with(|key| std::env::var(key).ok())
    }

    fn base_url_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        env(ENV_BASE_URL).unwrap_or_else(|| self.site.base_url.clone())
    }

    pub fn slack_timeout(&self) -> Duration {
        Duration::from_secs(self.slack.timeout_secs)
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !is_http_url(&self.site.base_url) {
            warnings.push(format!(
                "Invalid site.base_url '{}': should start with http:// or https://",
                self.site.base_url
            ));
        }
        if let Some(url) = &self.slack.api_url
            && !is_http_url(url)
        {
            warnings.push(format!(
                "Invalid slack.api_url '{}': should start with http:// or https://",
                url
            ));
        }
        if self.slack.timeout_secs == 0 {
            warnings.push("slack.timeout_secs is 0: every message would time out".to_string());
        }
        if self.slack.enabled && self.slack_token().is_none() {
            warnings.push(format!(
                "Slack is enabled but no token is set (slack.token or {})",
                ENV_SLACK_TOKEN
            ));
        }
        if self.slack.token.is_some() {
            warnings.push(format!(
                "slack.token is stored in the config file; prefer {}",
                ENV_SLACK_TOKEN
            ));
        }

        warnings
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Runtime configuration: zoo.toml merged with CLI arguments.
#[derive(Debug, Clone)]
pub struct ZooConfig {
    pub project_dir: PathBuf,
    pub zoo_dir: PathBuf,
    pub toml: ZooToml,
    pub verbose: bool,
    /// CLI override for the database location.
    pub cli_db_path: Option<PathBuf>,
}

impl ZooConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let zoo_dir = project_dir.join(ZOO_DIR);
        let toml = ZooToml::load_or_default(&zoo_dir)?;

        Ok(Self {
            project_dir,
            zoo_dir,
            toml,
            verbose: false,
            cli_db_path: None,
        })
    }

    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        db_path: Option<PathBuf>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.cli_db_path = db_path;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.zoo_dir.join(CONFIG_FILE)
    }

    /// Database path (CLI → file → default), resolved against the project.
    pub fn db_path(&self) -> PathBuf {
        let path = self
            .cli_db_path
            .clone()
            .unwrap_or_else(|| self.toml.database.path.clone());
        if path.is_absolute() {
            path
        } else {
            self.project_dir.join(path)
        }
    }

    /// Effective log filter: `--verbose` forces debug for this crate.
    pub fn log_filter(&self) -> Option<String> {
        if self.verbose {
            Some("zoo=debug".to_string())
        } else {
            self.toml.logging.filter.clone()
        }
    }
}
