//! Application configuration management.
//!
//! Holds the upstream endpoint and the cache time scales. Stored at
//! `~/.config/hitfactor/config.json`; every field is optional and falls
//! back to its default. `HITFACTOR_UPSTREAM_URL` and
//! `HITFACTOR_TIMEOUT_SECS` override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::api::ClientSettings;
use crate::cache::SyncSettings;

/// Application name used for the config directory path
const APP_NAME: &str = "hitfactor";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8787/api";

pub const ENV_UPSTREAM_URL: &str = "HITFACTOR_UPSTREAM_URL";
pub const ENV_TIMEOUT_SECS: &str = "HITFACTOR_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream_base_url: String,
    pub request_timeout_secs: u64,
    pub sync_max_age_hours: i64,
    pub sync_idle_eviction_minutes: i64,
    pub response_ttl_secs: i64,
    pub raw_cache_max_entries: usize,
    pub raw_cache_ttl_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_base_url: DEFAULT_UPSTREAM_URL.to_string(),
            request_timeout_secs: 30,
            sync_max_age_hours: 72,
            sync_idle_eviction_minutes: 60,
            response_ttl_secs: 10,
            raw_cache_max_entries: 100,
            raw_cache_ttl_secs: 60,
        }
    }
}

impl Config {
    /// Load from the default path, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_UPSTREAM_URL).filter(|u| !u.trim().is_empty()) {
            self.upstream_base_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_TIMEOUT_SECS))?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            max_age: Duration::hours(self.sync_max_age_hours),
            idle_eviction: Duration::minutes(self.sync_idle_eviction_minutes),
            fetch_timeout: self.request_timeout(),
        }
    }

    pub fn response_ttl(&self) -> Duration {
        Duration::seconds(self.response_ttl_secs)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            request_timeout: self.request_timeout(),
            raw_cache_max_entries: self.raw_cache_max_entries,
            raw_cache_ttl: Duration::seconds(self.raw_cache_ttl_secs),
            ..ClientSettings::new(&self.upstream_base_url)
        }
    }
}
