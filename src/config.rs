//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener and connection-limit configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_host() -> String {
    // Viewers are expected on the same machine; bind loopback by default
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_max_connections() -> usize {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Measurement engine configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    /// External measurement command emitting one sample record per stdout
    /// line. When unset the hub idles, relaying nothing.
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}

/// Sample queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_high_water")]
    pub high_water: usize,
}

fn default_high_water() -> usize {
    10_000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            high_water: default_high_water(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("bandcast").join("config.toml")),
            Some(PathBuf::from("/etc/bandcast/config.toml")),
            Some(PathBuf::from("./bandcast.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BANDCAST_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BANDCAST_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(max) = std::env::var("BANDCAST_MAX_CONNECTIONS") {
            if let Ok(m) = max.parse() {
                self.server.max_connections = m;
            }
        }

        if let Ok(command) = std::env::var("BANDCAST_SOURCE_CMD") {
            self.source.command = Some(command);
        }

        if let Ok(high_water) = std::env::var("BANDCAST_QUEUE_HIGH_WATER") {
            if let Ok(h) = high_water.parse() {
                self.queue.high_water = h;
            }
        }

        if let Ok(level) = std::env::var("BANDCAST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("BANDCAST_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            source: SourceConfig::default(),
            queue: QueueConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Bandcast Configuration
#
# Environment variables override these settings:
# - BANDCAST_HOST
# - BANDCAST_PORT
# - BANDCAST_MAX_CONNECTIONS
# - BANDCAST_SOURCE_CMD
# - BANDCAST_QUEUE_HIGH_WATER
# - BANDCAST_LOG_LEVEL
# - BANDCAST_LOG_FORMAT

[server]
# WebSocket listener host
host = "127.0.0.1"

# WebSocket listener port
port = 8765

# Maximum number of concurrent viewer connections
max_connections = 1000

[source]
# External measurement command; emits one JSON sample record per line,
# each containing at least a "device_name" field.
# command = "nethogs-json"
# args = ["-d", "1"]

[queue]
# Backlog depth at which the sample queue starts warning
high_water = 10000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.addr(), "127.0.0.1:8765");
        assert_eq!(config.server.max_connections, 1000);
        assert!(config.source.command.is_none());
        assert_eq!(config.queue.high_water, 10_000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
port = 9000

[source]
command = "nethogs-json"
args = ["-d", "1"]

[queue]
high_water = 500
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        // Unset fields fall back to defaults
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.source.command.as_deref(), Some("nethogs-json"));
        assert_eq!(config.source.args, vec!["-d", "1"]);
        assert_eq!(config.queue.high_water, 500);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/bandcast.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not [valid toml").unwrap();

        let result = Config::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_generated_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.server.port, 8765);
    }
}
