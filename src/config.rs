use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::plugin::discovery::DiscoveryStrategy;
use crate::utils::paths::{expand_home, resolve_against};

pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";
pub const DEFAULT_CDN: &str = "https://cdn.jsdelivr.net/gh/esengine/ecs-editor-plugins@gh-pages";
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Packaging configuration (`[packaging]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingConfig {
    /// Root for per-build working directories
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,

    /// git executable used to clone plugin repositories
    #[serde(default = "default_git")]
    pub git: String,

    /// npm executable used to install and build
    #[serde(default = "default_npm")]
    pub npm: String,
}

fn default_temp_dir() -> String {
    ".temp".to_string()
}

fn default_git() -> String {
    "git".to_string()
}

fn default_npm() -> String {
    "npm".to_string()
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            git: default_git(),
            npm: default_npm(),
        }
    }
}

/// Security scanner configuration (`[security]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Base URL of the GitHub REST API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_GITHUB_API.to_string()
}

fn default_user_agent() -> String {
    "ecs-plugin-registry".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Logging configuration (`[logging]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// When set, logs are also written to a daily rolling file here
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: String,

    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default = "default_cdn")]
    pub cdn: String,

    #[serde(default)]
    pub discovery: DiscoveryStrategy,

    #[serde(default)]
    pub packaging: PackagingConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_plugins_dir() -> String {
    "plugins".to_string()
}

fn default_output() -> String {
    "registry.json".to_string()
}

fn default_schema_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

fn default_cdn() -> String {
    DEFAULT_CDN.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugins_dir: default_plugins_dir(),
            output: default_output(),
            schema_version: default_schema_version(),
            cdn: default_cdn(),
            discovery: DiscoveryStrategy::default(),
            packaging: PackagingConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load config from `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load_required(path)
    }

    /// Load config from `path`, failing when it does not exist.
    pub fn load_required(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Config file not found: {}", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?;

        Ok(config)
    }

    pub fn plugins_dir(&self, root: &Path) -> Result<PathBuf> {
        Ok(resolve_against(root, &expand_home(&self.plugins_dir)?))
    }

    pub fn output_path(&self, root: &Path) -> Result<PathBuf> {
        Ok(resolve_against(root, &expand_home(&self.output)?))
    }

    pub fn temp_root(&self, root: &Path) -> Result<PathBuf> {
        Ok(resolve_against(root, &expand_home(&self.packaging.temp_dir)?))
    }

    pub fn log_dir(&self, root: &Path) -> Result<Option<PathBuf>> {
        match self.logging.directory {
            Some(ref dir) => Ok(Some(resolve_against(root, &expand_home(dir)?))),
            None => Ok(None),
        }
    }
}
