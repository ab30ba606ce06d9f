//! Configuration management for tubedigest
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! Credentials are never stored in the file; the config only names the
//! environment variables they are read from.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Content acquisition (sharing service) configuration
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Language model backend configuration
    #[serde(default)]
    pub models: ModelsConfig,

    /// Work queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Direct sharing endpoint (token strategy)
    #[serde(default = "default_direct_url")]
    pub direct_url: String,

    /// Session generation endpoint (polling strategy)
    #[serde(default = "default_session_url")]
    pub session_url: String,

    /// Environment variable name for the OAuth token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Environment variable name for the session cookie
    #[serde(default = "default_session_env")]
    pub session_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_acquisition_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of session polls before giving up
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Poll interval used until the server sends its own
    #[serde(default = "default_poll_interval_ms")]
    pub default_poll_interval_ms: u64,

    /// Theses required before an outline is accepted
    #[serde(default = "default_min_outline_theses")]
    pub min_outline_theses: usize,

    /// Minimum characters for a summary block to be kept (0 = any)
    #[serde(default)]
    pub min_summary_block_chars: usize,

    /// Minimum characters for a thesis or meta fragment to be kept (0 = any)
    #[serde(default)]
    pub min_thesis_chars: usize,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_models_api_url")]
    pub api_url: String,

    /// Environment variable name for the API key
    #[serde(default = "default_models_api_key_env")]
    pub api_key_env: String,

    /// Optional HTTP-Referer sent with every request
    #[serde(default)]
    pub site_url: Option<String>,

    /// Summarization models in priority order
    #[serde(default = "default_summary_models")]
    pub summary_models: Vec<String>,

    /// Token budgets tried per model, largest first
    #[serde(default = "default_token_budgets")]
    pub token_budgets: Vec<u32>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_models_timeout")]
    pub timeout_secs: u64,

    /// Condensation models (empty = same as summary_models)
    #[serde(default)]
    pub condense_models: Vec<String>,

    /// Token budget for the condensed digest
    #[serde(default = "default_condense_max_tokens")]
    pub condense_max_tokens: u32,

    /// Pause between full analysis and condensation
    #[serde(default = "default_condense_pause_secs")]
    pub condense_pause_secs: u64,

    /// Case-insensitive body fragments that mean "backend has no capacity"
    #[serde(default = "default_no_capacity_markers")]
    pub no_capacity_markers: Vec<String>,
}

/// Work queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Minutes after which a processing item is considered stuck
    #[serde(default = "default_stale_minutes")]
    pub stale_minutes: i64,

    /// Items processed per `run` cycle
    #[serde(default = "default_max_items_per_cycle")]
    pub max_items_per_cycle: usize,

    /// Only retry errored items with fewer failed attempts than this
    #[serde(default)]
    pub max_error_attempts: Option<u32>,

    /// Retention window used by `cleanup`
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for tubedigest data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            direct_url: default_direct_url(),
            session_url: default_session_url(),
            token_env: default_token_env(),
            session_env: default_session_env(),
            timeout_secs: default_acquisition_timeout(),
            max_poll_attempts: default_max_poll_attempts(),
            default_poll_interval_ms: default_poll_interval_ms(),
            min_outline_theses: default_min_outline_theses(),
            min_summary_block_chars: 0,
            min_thesis_chars: 0,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            api_url: default_models_api_url(),
            api_key_env: default_models_api_key_env(),
            site_url: None,
            summary_models: default_summary_models(),
            token_budgets: default_token_budgets(),
            temperature: default_temperature(),
            timeout_secs: default_models_timeout(),
            condense_models: Vec::new(),
            condense_max_tokens: default_condense_max_tokens(),
            condense_pause_secs: default_condense_pause_secs(),
            no_capacity_markers: default_no_capacity_markers(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            stale_minutes: default_stale_minutes(),
            max_items_per_cycle: default_max_items_per_cycle(),
            max_error_attempts: None,
            retention_days: default_retention_days(),
        }
    }
}

impl AcquisitionConfig {
    /// OAuth token for the direct strategy, if set and non-empty
    pub fn oauth_token(&self) -> Option<String> {
        read_secret(&self.token_env)
    }

    /// Session cookie value for the polling strategy, if set and non-empty
    pub fn session_cookie(&self) -> Option<String> {
        read_secret(&self.session_env)
    }
}

impl ModelsConfig {
    /// API key for the model backend, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        read_secret(&self.api_key_env)
    }

    /// Models used for condensation
    pub fn condense_models(&self) -> &[String] {
        if self.condense_models.is_empty() {
            &self.summary_models
        } else {
            &self.condense_models
        }
    }
}

fn read_secret(var: &str) -> Option<String> {
    if var.is_empty() {
        return None;
    }
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Get the default base directory for tubedigest (~/.tubedigest)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tubedigest")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Point all paths at the given base directory
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("videos.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("videos.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if tubedigest is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.models.summary_models.is_empty() {
            return Err(Error::Config(
                "models.summary_models must name at least one model".to_string(),
            ));
        }

        if self.models.token_budgets.is_empty() {
            return Err(Error::Config(
                "models.token_budgets must not be empty".to_string(),
            ));
        }

        if self.models.token_budgets.contains(&0) {
            return Err(Error::Config(
                "models.token_budgets must be positive".to_string(),
            ));
        }

        if self
            .models
            .token_budgets
            .windows(2)
            .any(|pair| pair[0] <= pair[1])
        {
            return Err(Error::Config(
                "models.token_budgets must be strictly descending".to_string(),
            ));
        }

        if self.models.condense_max_tokens == 0 {
            return Err(Error::Config(
                "models.condense_max_tokens must be positive".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.models.temperature) {
            return Err(Error::Config(
                "models.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.acquisition.max_poll_attempts == 0 {
            return Err(Error::Config(
                "acquisition.max_poll_attempts must be positive".to_string(),
            ));
        }

        if self.queue.stale_minutes < 0 {
            return Err(Error::Config(
                "queue.stale_minutes must not be negative".to_string(),
            ));
        }

        if self.queue.retention_days < 0 {
            return Err(Error::Config(
                "queue.retention_days must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}
