use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::scheduler::RetryPolicy;

pub const DEFAULT_API_URL: &str = "https://api.nasa.gov/planetary/apod";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_api_key")]
    pub api_key: String,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Daily run time, `HH:MM` in UTC.
    #[serde(default = "default_run_at")]
    pub run_at: String,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_api_key() -> String {
    "DEMO_KEY".to_string()
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("apod-etl");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("apod.db").to_string_lossy().to_string()
}

fn default_http_timeout() -> u64 {
    30
}

fn default_run_at() -> String {
    "00:00".to_string()
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: default_api_key(),
            db_path: default_db_path(),
            http_timeout_secs: default_http_timeout(),
            run_at: default_run_at(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("apod-etl")
            .join("config.toml")
    }

    /// Credentials and the database location may come from the environment
    /// so they never have to live in the config file.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("APOD_API_KEY").or_else(|_| std::env::var("NASA_API_KEY")) {
            self.api_key = key;
        }
        if let Ok(path) = std::env::var("APOD_DB_PATH") {
            self.db_path = path;
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_url)
            .map_err(|e| AppError::Config(format!("invalid api_url {:?}: {}", self.api_url, e)))?;
        self.run_at_time()?;
        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("http_timeout_secs must be positive".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(AppError::Config("api_key is empty".to_string()));
        }
        Ok(())
    }

    pub fn run_at_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.run_at, "%H:%M")
            .map_err(|e| AppError::Config(format!("invalid run_at {:?}: {}", self.run_at, e)))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}
