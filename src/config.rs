use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub devices: DevicesConfig,
    #[serde(default)]
    pub pairing: PairingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub https: Option<HttpsConfig>,
    pub ui_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpsConfig {
    pub enabled: bool,
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// Heartbeats older than this classify the device as offline.
    pub freshness_window_secs: i64,
    /// How often the staleness sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: 90,
            sweep_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    pub code_ttl_minutes: i64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            code_ttl_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_template() -> &'static str {
        r#"[server]
host = "0.0.0.0"
port = 8080

[server.https]
enabled = false
cert_path = "certs/cert.pem"
key_path = "certs/key.pem"

# Optional: Path to the dashboard UI build directory.
# If unset, the server serves "./static".
# ui_path = "./static"

[database]
# URL for the SQLite database. Ensure the directory exists.
url = "sqlite://signcast.db"

[devices]
# Heartbeats older than this (seconds) mark a device offline.
freshness_window_secs = 90
# How often (seconds) the staleness sweep runs.
sweep_interval_secs = 30

[pairing]
# How long a device link code stays redeemable.
code_ttl_minutes = 15

[logging]
level = "info"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_parses() {
        let config: Config = toml::from_str(Config::default_template()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.devices.freshness_window_secs, 90);
        assert_eq!(config.pairing.code_ttl_minutes, 15);
    }

    #[test]
    fn device_and_pairing_sections_are_optional() {
        let config: Config = toml::from_str(
            r#"
[server]
host = "127.0.0.1"
port = 9090

[database]
url = "sqlite://test.db"

[logging]
level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(config.devices.sweep_interval_secs, 30);
        assert_eq!(config.pairing.code_ttl_minutes, 15);
    }
}
