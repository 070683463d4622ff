use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::{ProviderSettings, RetryPolicy};
use crate::error::{AppError, Result};
use crate::ingest::IngestSettings;

/// Environment variable consulted when the config file has no API key.
pub const API_KEY_ENV: &str = "NEWS_ANALYZER_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_provider")]
    pub provider: String,

    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_courtesy_delay")]
    pub courtesy_delay_ms: u64,

    #[serde(default = "default_progress_every")]
    pub progress_every: usize,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("company_news")
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_courtesy_delay() -> u64 {
    500
}

fn default_progress_every() -> usize {
    5
}

fn default_min_confidence() -> f64 {
    0.3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            model: None,
            endpoint: None,
            output_dir: default_output_dir(),
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            courtesy_delay_ms: default_courtesy_delay(),
            progress_every: default_progress_every(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`. A missing
    /// file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        if config.api_key.is_none() {
            config.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Never write a key that came from the environment back to disk.
        let on_disk = Config {
            api_key: None,
            ..self.clone()
        };
        let content = toml::to_string_pretty(&on_disk)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ticker-news")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(AppError::Config(format!(
                "min_confidence must be between 0 and 1, got {}",
                self.min_confidence
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            min_confidence: self.min_confidence,
            courtesy_delay: Duration::from_millis(self.courtesy_delay_ms),
            progress_every: self.progress_every,
        }
    }
}
