/// Application configuration management
/// Stores user preferences in <config dir>/smsgw/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::constants::{
    DEFAULT_API_URL, DEFAULT_LIST_REFRESH, DEFAULT_LIVE_REFRESH, DEFAULT_REQUEST_TIMEOUT_SECS,
};

pub const API_URL_ENV: &str = "SMSGW_API_URL";
pub const TOKEN_ENV: &str = "SMSGW_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub request_timeout_secs: u64,
    /// humantime duration, e.g. "30s"
    pub list_refresh: String,
    /// humantime duration, e.g. "3s"
    pub live_refresh: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            list_refresh: DEFAULT_LIST_REFRESH.to_string(),
            live_refresh: DEFAULT_LIVE_REFRESH.to_string(),
        }
    }
}

impl AppConfig {
    /// Get config directory, creating it if needed
    pub fn config_dir() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Could not determine the user config directory")?;
        let config_dir = base.join("smsgw");

        fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Where the session token is persisted
    pub fn token_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("token"))
    }

    /// Log file used by the interactive dashboard
    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("smsgw.log"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Set and save the backend URL
    pub fn set_api_url(&mut self, url: &str) -> Result<()> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("API URL must start with http:// or https://");
        }
        self.api_url = url.trim_end_matches('/').to_string();
        self.save()
    }

    /// Backend URL, with `SMSGW_API_URL` taking precedence over the file
    pub fn resolved_api_url(&self) -> String {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => self.api_url.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn list_refresh(&self) -> Result<Duration> {
        parse_interval(&self.list_refresh, "list_refresh")
    }

    pub fn live_refresh(&self) -> Result<Duration> {
        parse_interval(&self.live_refresh, "live_refresh")
    }

    fn validate(&self) -> Result<()> {
        self.list_refresh()?;
        self.live_refresh()?;
        Ok(())
    }
}

fn parse_interval(raw: &str, field: &str) -> Result<Duration> {
    let interval = humantime::parse_duration(raw)
        .with_context(|| format!("Invalid {} value '{}'", field, raw))?;
    if interval.is_zero() {
        anyhow::bail!("{} must be greater than zero", field);
    }
    Ok(interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.list_refresh().unwrap(), Duration::from_secs(30));
        assert_eq!(config.live_refresh().unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig {
            api_url: "https://gateway.example.com/api".to_string(),
            list_refresh: "1m".to_string(),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.list_refresh().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "live_refresh = \"500ms\"\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.api_url, DEFAULT_API_URL);
        assert_eq!(loaded.live_refresh().unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "list_refresh = \"soon\"\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());

        fs::write(&path, "list_refresh = \"0s\"\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }
}
