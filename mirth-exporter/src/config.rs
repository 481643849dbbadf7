//! Configuration for the Mirth exporter.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP endpoint settings.
    #[serde(default)]
    pub web: WebConfig,

    /// Mirth Connect CLI settings.
    #[serde(default)]
    pub mccli: MccliConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Address to listen on (default: ":9140", all interfaces).
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,
}

fn default_listen_address() -> String {
    ":9140".to_string()
}

fn default_telemetry_path() -> String {
    "/metrics".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            telemetry_path: default_telemetry_path(),
        }
    }
}

/// Mirth Connect CLI (`mccommand`) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MccliConfig {
    /// Path to the `mccommand` executable.
    #[serde(default = "default_mccli_path")]
    pub path: String,

    /// Extra arguments passed before `-s <query file>`, e.g. the server
    /// address and credentials.
    #[serde(default)]
    pub args: Vec<String>,

    /// Maximum run time of one invocation (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_mccli_path() -> String {
    "./mccommand".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for MccliConfig {
    fn default() -> Self {
        Self {
            path: default_mccli_path(),
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "DEBUG", "INFO", "WARN", "ERROR" (case-insensitive).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_listen_address(&self.web.listen_address)?;

        let path = &self.web.telemetry_path;
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }
        if path == "/" {
            return Err(ConfigError::Validation(
                "Metrics path must not be the root path".to_string(),
            ));
        }

        if self.mccli.path.is_empty() {
            return Err(ConfigError::Validation(
                "mccli.path must not be empty".to_string(),
            ));
        }

        if self.mccli.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        parse_log_level(&self.logging.level)?;

        Ok(())
    }

    /// The socket address to bind the HTTP server to.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_address(&self.web.listen_address)
    }

    /// The configured log level.
    pub fn log_level(&self) -> Result<Level, ConfigError> {
        parse_log_level(&self.logging.level)
    }
}

/// Parse a `host:port` listen address.
///
/// A bare `:port` listens on all IPv4 interfaces.
pub fn parse_listen_address(addr: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid listen address: {}", addr));

    if let Some(port) = addr.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|_| invalid())?;
        return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
    }

    addr.parse().map_err(|_| invalid())
}

/// Parse a log level name such as `INFO` or `debug`.
pub fn parse_log_level(level: &str) -> Result<Level, ConfigError> {
    match level.to_ascii_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        _ => Err(ConfigError::Validation(format!(
            "Invalid log level: {} (expected DEBUG, INFO, WARN or ERROR)",
            level
        ))),
    }
}
