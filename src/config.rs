use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::http::RetryPolicy;
use crate::paths::config_file_path;

pub const DB_ENV: &str = "DANMAKU_STORE_DB";
pub const VOD_URL_ENV: &str = "DANMAKU_STORE_VOD_URL";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub vod: VodConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VodConfig {
    pub base_url: Option<String>,
    pub referer: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub attempts: usize,
    pub retry_delay_ms: u64,
}

impl Default for VodConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            referer: String::new(),
            connect_timeout_ms: 3_000,
            read_timeout_ms: 6_000,
            attempts: 3,
            retry_delay_ms: 1_000,
        }
    }
}

impl VodConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            attempts: self.attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl Config {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                Self::from_file(path)?
            }
            None => {
                let path = config_file_path()?;
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        if config.vod.attempts == 0 {
            bail!("vod.attempts must be at least 1");
        }
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(DB_ENV).filter(|value| !value.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup(VOD_URL_ENV).filter(|value| !value.trim().is_empty()) {
            self.vod.base_url = Some(url);
        }
    }
}
