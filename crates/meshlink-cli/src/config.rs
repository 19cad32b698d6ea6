//! Configuration system for the meshlink CLI.

use meshlink_core::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// meshlink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Device connection
    #[serde(default)]
    pub device: DeviceConfig,
    /// Request deadlines and packet settings
    #[serde(default)]
    pub requests: RequestConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Device connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device address (host:port)
    #[serde(default = "default_address")]
    pub address: String,
    /// Seconds between keepalives (0 disables them)
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

/// Request deadlines and packet settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Seconds to wait for a reply
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seconds to wait for a ping ack
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
    /// Seconds to wait for the config dump
    #[serde(default = "default_configure_timeout_secs")]
    pub configure_timeout_secs: u64,
    /// Hop limit of originated packets
    #[serde(default = "default_hop_limit")]
    pub hop_limit: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_address() -> String {
    format!("127.0.0.1:{}", meshlink_transport::DEFAULT_TCP_PORT)
}

fn default_heartbeat_secs() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_ping_timeout_secs() -> u64 {
    30
}

fn default_configure_timeout_secs() -> u64 {
    30
}

fn default_hop_limit() -> u32 {
    meshlink_proto::DEFAULT_HOP_LIMIT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
            configure_timeout_secs: default_configure_timeout_secs(),
            hop_limit: default_hop_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("meshlink/config.toml")
    }

    /// Load config from default path, or create default if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_host_port(&self.device.address)?;

        if self.requests.timeout_secs == 0 || self.requests.timeout_secs > 600 {
            anyhow::bail!("Request timeout must be between 1 and 600 seconds");
        }
        if self.requests.ping_timeout_secs == 0 || self.requests.ping_timeout_secs > 600 {
            anyhow::bail!("Ping timeout must be between 1 and 600 seconds");
        }
        if self.requests.configure_timeout_secs == 0 {
            anyhow::bail!("Configure timeout must be at least 1 second");
        }
        if self.requests.hop_limit > 7 {
            anyhow::bail!("Hop limit must be between 0 and 7");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }

    /// Session settings derived from this configuration
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig {
            request_timeout: Duration::from_secs(self.requests.timeout_secs),
            ping_timeout: Duration::from_secs(self.requests.ping_timeout_secs),
            configure_timeout: Duration::from_secs(self.requests.configure_timeout_secs),
            hop_limit: self.requests.hop_limit,
            ..SessionConfig::default()
        };
        if self.device.heartbeat_secs > 0 {
            config = config.with_heartbeat(Duration::from_secs(self.device.heartbeat_secs));
        }
        config
    }
}

/// Validate host:port format
fn validate_host_port(addr: &str) -> anyhow::Result<()> {
    let Some((host, port)) = addr.rsplit_once(':') else {
        anyhow::bail!("Device address '{}' missing port (expected format: host:port)", addr);
    };

    let port: u16 = port
        .parse()
        .map_err(|_| anyhow::anyhow!("Device address '{}' has invalid port: {}", addr, port))?;
    if port == 0 {
        anyhow::bail!("Device address '{}' has invalid port: 0", addr);
    }
    if host.is_empty() {
        anyhow::bail!("Device address '{}' has empty hostname", addr);
    }
    if host.contains('/') || host.contains('\\') {
        anyhow::bail!("Device address '{}' contains invalid characters", addr);
    }
    Ok(())
}
