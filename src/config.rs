//! Configuration management
//!
//! Handles loading of the JSON configuration file with environment
//! variable overrides for the service URL and the account identity.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::session::Account;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub account: AccountConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env();
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise defaults plus environment.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::from_file(path);
        }
        let mut config = Config::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("GRID_BOT_API_URL") {
            self.backend.base_url = url;
        }
        if let Ok(account_id) = std::env::var("GRID_BOT_ACCOUNT_ID") {
            self.account.account_id = Some(account_id);
        }
        if let Ok(address) = std::env::var("GRID_BOT_WALLET_ADDRESS") {
            self.account.address = Some(address);
        }
    }
}

/// Grid bot service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Retries for read-only calls; 0 keeps fetch failures unretried
    pub max_retries: u32,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
            max_retries: 0,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown_secs: 60,
        }
    }
}

/// Cache freshness and refresh cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub ttl_ms: u64,
    pub debounce_ms: u64,
    /// Visibility-gated polling; off when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    pub notice_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            ttl_ms: 30_000,
            debounce_ms: 500,
            poll_interval_secs: None,
            notice_capacity: 64,
        }
    }
}

impl SyncConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Account the CLI acts for
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl AccountConfig {
    /// Both the account id and the wallet address are needed to act.
    pub fn account(&self) -> Option<Account> {
        match (&self.account_id, &self.address) {
            (Some(id), Some(address)) => Some(Account::new(id.clone(), address.clone())),
            _ => None,
        }
    }
}
