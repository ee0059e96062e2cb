//! Configuration Management
//!
//! Handles persistent configuration storage for jsreconcile: where the
//! servers are, how to authenticate, and the server limits validation
//! should assume.

use crate::nats::{ConnectionConfig, TlsConfig};
use crate::validate::ServerLimits;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the server list (comma separated)
pub const ENV_SERVERS: &str = "NATS_URL";
/// Environment variable overriding the credentials file
pub const ENV_CREDENTIALS: &str = "NATS_CREDS";

fn default_request_timeout() -> u64 {
    30
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server URLs
    #[serde(default)]
    pub servers: Vec<String>,
    /// Path to a `.creds` file
    #[serde(default)]
    pub credentials: Option<PathBuf>,
    /// Inline `.creds` contents
    #[serde(default)]
    pub credential_data: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// NKey seed
    #[serde(default)]
    pub nkey: Option<String>,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Cluster-wide ceiling for consumer pull batches
    #[serde(default)]
    pub max_request_batch: Option<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            credentials: None,
            credential_data: None,
            user: None,
            password: None,
            nkey: None,
            tls: TlsConfig::default(),
            request_timeout_secs: default_request_timeout(),
            max_request_batch: None,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("jsreconcile").join("config.json"))
    }

    /// Load configuration from the default location, then apply environment overrides
    pub fn load() -> Self {
        let mut config = match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Load configuration from a file, falling back to defaults when it is
    /// missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config {:?}: {}", path, e);
                Self::default()
            },
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Apply `NATS_URL` and `NATS_CREDS`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(urls) = lookup(ENV_SERVERS).filter(|v| !v.is_empty()) {
            self.servers = split_servers(&urls);
        }
        if let Some(creds) = lookup(ENV_CREDENTIALS).filter(|v| !v.is_empty()) {
            self.credentials = Some(PathBuf::from(creds));
        }
    }

    /// Explicit connection settings for a session
    pub fn connection(&self) -> ConnectionConfig {
        let defaults = ConnectionConfig::default();
        ConnectionConfig {
            servers: if self.servers.is_empty() {
                defaults.servers
            } else {
                self.servers.clone()
            },
            credentials: self.credentials.clone(),
            credential_data: self.credential_data.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            nkey: self.nkey.clone(),
            tls: self.tls.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..defaults
        }
    }

    /// Server limits assumed during validation
    pub fn server_limits(&self) -> ServerLimits {
        ServerLimits {
            max_request_batch: self.max_request_batch,
        }
    }
}

/// Split a comma separated server list
pub fn split_servers(urls: &str) -> Vec<String> {
    urls.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
