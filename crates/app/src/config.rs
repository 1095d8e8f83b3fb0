use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use gitpulse_core::domain::{FetchLimits, DEFAULT_MAX_EVENTS, DEFAULT_MAX_EVENT_AGE_DAYS, DEFAULT_MAX_REPOSITORIES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::CliArgs;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Config {
    pub version: u32,
    pub bind_address: String,
    pub snapshot_path: PathBuf,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub max_repositories: usize,
    pub max_events: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub api_url: String,
    pub max_event_age_days: i64,
    pub per_page: u32,
    pub max_pages: u32,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Deadline for a whole multi-page fetch
    pub fetch_timeout_secs: u64,
    pub token_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            bind_address: "127.0.0.1:5000".to_string(),
            snapshot_path: default_snapshot_path(),
            cache: CacheConfig::default(),
            source: SourceConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_repositories: DEFAULT_MAX_REPOSITORIES,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            max_event_age_days: DEFAULT_MAX_EVENT_AGE_DAYS,
            per_page: 100,
            max_pages: 10,
            timeout_secs: 30,
            fetch_timeout_secs: 60,
            token_file: None,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

pub fn get_default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "gitpulse")
        .context("Failed to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    Ok(config_dir.join("gitpulse.toml"))
}

fn default_snapshot_path() -> PathBuf {
    ProjectDirs::from("", "", "gitpulse")
        .map(|dirs| dirs.data_dir().join("repository_data.json"))
        .unwrap_or_else(|| PathBuf::from("repository_data.json"))
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p,
            None => get_default_config_path()?,
        };

        if !path.exists() {
            let default_config = Config::default();
            // Create directory if it doesn't exist
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .context("Failed to create config directory")?;
            }
            default_config.save(&path)?;
            return Ok(default_config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config to TOML")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn from_cli_and_file(cli_args: CliArgs) -> Result<Self> {
        let mut config = Self::load(cli_args.config)?;

        // CLI args override config file
        if let Some(bind) = cli_args.bind {
            config.bind_address = bind;
        }
        if let Some(snapshot) = cli_args.snapshot {
            config.snapshot_path = snapshot;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the cache and fetch loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_repositories == 0 {
            bail!("cache.max_repositories must be at least 1");
        }
        if self.cache.max_events == 0 {
            bail!("cache.max_events must be at least 1");
        }
        if self.source.per_page == 0 {
            bail!("source.per_page must be at least 1");
        }
        if self.source.max_pages == 0 {
            bail!("source.max_pages must be at least 1");
        }
        if self.source.timeout_secs == 0 || self.source.fetch_timeout_secs == 0 {
            bail!("source timeouts must be at least 1 second");
        }
        if self.source.max_event_age_days < 0 {
            bail!("source.max_event_age_days must not be negative");
        }
        if self.bind_address.trim().is_empty() {
            bail!("bind_address must not be empty");
        }
        Ok(())
    }

    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits::new(self.cache.max_events, self.source.max_event_age_days)
    }
}
