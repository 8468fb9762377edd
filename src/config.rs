use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::EntityKind;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub pagination: PaginationConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the job-board API, e.g. https://api.example.com/v1
  pub url: String,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long a fetched value counts as fresh
  #[serde(default = "default_freshness_secs")]
  pub freshness_secs: u64,
  /// Per-family overrides of `freshness_secs`
  #[serde(default)]
  pub entities: EntityFreshness,
}

fn default_freshness_secs() -> u64 {
  60
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      freshness_secs: default_freshness_secs(),
      entities: EntityFreshness::default(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityFreshness {
  pub job: Option<u64>,
  pub state: Option<u64>,
  pub country: Option<u64>,
  pub application: Option<u64>,
}

impl CacheConfig {
  /// Freshness window for one entity family.
  pub fn freshness(&self, kind: EntityKind) -> Duration {
    let secs = match kind {
      EntityKind::Job => self.entities.job,
      EntityKind::State => self.entities.state,
      EntityKind::Country => self.entities.country,
      EntityKind::Application => self.entities.application,
    };
    Duration::from_secs(secs.unwrap_or(self.freshness_secs))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
  #[serde(default = "default_per_page")]
  pub per_page: usize,
}

fn default_per_page() -> usize {
  10
}

impl Default for PaginationConfig {
  fn default() -> Self {
    Self {
      per_page: default_per_page(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Filter directive used when JOBDESK_LOG is unset
  #[serde(default = "default_level")]
  pub level: String,
  /// Where log files go (defaults to the platform data directory)
  pub directory: Option<PathBuf>,
}

fn default_level() -> String {
  "info".to_string()
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_level(),
      directory: None,
    }
  }
}

impl LoggingConfig {
  pub fn directory(&self) -> PathBuf {
    self.directory.clone().unwrap_or_else(|| {
      dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("jobdesk")
        .join("logs")
    })
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jobdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jobdesk/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/jobdesk/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("jobdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jobdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.pagination.per_page == 0 {
      return Err(eyre!("pagination.per_page must be at least 1"));
    }
    Ok(config)
  }

  /// Get the API bearer token from environment variables.
  ///
  /// Checks JOBDESK_API_TOKEN first, then JOBDESK_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("JOBDESK_API_TOKEN")
      .or_else(|_| std::env::var("JOBDESK_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set JOBDESK_API_TOKEN or JOBDESK_TOKEN environment variable.")
      })
  }
}
