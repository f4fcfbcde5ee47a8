//! Configuration for the webhook server.
//!
//! Settings live in a JSON file (`config.json` by default). A default file
//! is written on first start so the operator has something to edit.
//! Environment variables override file values for the secrets
//! (`UNIFI_API_KEY`, `UNIFI_BASE_URL`, `UNIFI_SITE_ID`, `UNIFI_DEVICE_ID`,
//! `WEBHOOK_AUTH_TOKEN`).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// UniFi Network integration API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiSettings {
    pub api_key: String,
    pub base_url: String,
    pub site_id: String,
    pub device_id: String,
}

/// A switch port with a device attached, keyed by port number in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortEntry {
    pub name: String,
    pub ip: String,
}

/// HTTP front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    pub host: String,
    pub port: u16,
    /// Empty string disables authentication.
    #[serde(default)]
    pub auth_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub unifi: UnifiSettings,
    /// Configured ports, keyed by port number as a string (JSON map keys).
    pub ports: BTreeMap<String, PortEntry>,
    pub webhook: WebhookSettings,
}

impl Default for Config {
    fn default() -> Self {
        let mut ports = BTreeMap::new();
        for n in 1u16..=4 {
            ports.insert(
                n.to_string(),
                PortEntry {
                    name: format!("pi-node-{}", n),
                    ip: format!("172.16.254.10{}", n),
                },
            );
        }
        Self {
            unifi: UnifiSettings {
                api_key: "your-api-key-here".to_string(),
                base_url: "https://10.0.1.1/proxy/network/integration/v1".to_string(),
                site_id: "your-site-id-here".to_string(),
                device_id: "your-device-id-here".to_string(),
            },
            ports,
            webhook: WebhookSettings {
                host: "0.0.0.0".to_string(),
                port: 5000,
                auth_token: String::new(),
            },
        }
    }
}

impl Config {
    /// Whether a port number appears in the configured ports map.
    pub fn is_port_configured(&self, port: u16) -> bool {
        self.ports.contains_key(&port.to_string())
    }

    /// Overlay environment variables on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("UNIFI_API_KEY") {
            self.unifi.api_key = v;
        }
        if let Ok(v) = std::env::var("UNIFI_BASE_URL") {
            self.unifi.base_url = v;
        }
        if let Ok(v) = std::env::var("UNIFI_SITE_ID") {
            self.unifi.site_id = v;
        }
        if let Ok(v) = std::env::var("UNIFI_DEVICE_ID") {
            self.unifi.device_id = v;
        }
        if let Ok(v) = std::env::var("WEBHOOK_AUTH_TOKEN") {
            self.webhook.auth_token = v;
        }
    }
}

/// Load the config file, writing a default one first if it does not exist.
pub fn load_or_create(path: &Path) -> Result<Config, ConfigError> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)?
    } else {
        let default = Config::default();
        std::fs::write(path, serde_json::to_string_pretty(&default)?)?;
        info!("Created default config file: {}", path.display());
        default
    };
    config.apply_env_overrides();
    Ok(config)
}
