//! Configuration management
//!
//! This module provides INI-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for every key except the mandatory `[logging]` section

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, File, FileFormat, Source};
use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "WM_MONITOR_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of runtime worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Gzip compression level (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
    /// Maximum accepted request body, e.g. `100MB`
    #[serde(default = "default_max_request_size")]
    pub max_request_size: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_compression_level() -> u32 {
    6
}

fn default_max_request_size() -> String {
    "10MB".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            compression_level: default_compression_level(),
            max_request_size: default_max_request_size(),
        }
    }
}

impl ServerConfig {
    /// Request body limit in bytes
    pub fn max_request_bytes(&self) -> Result<usize> {
        parse_byte_size(&self.max_request_size)
    }
}

/// Client certificate handling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// How a role is read out of a client certificate.
    ///
    /// One of `none`, `subject_ou`, `subject_cn`, `subject_o` or
    /// `extension:<dotted-oid>`.
    #[serde(default = "default_role_source")]
    pub role_source: String,
    /// Header a TLS-terminating proxy uses to forward the PEM certificate
    #[serde(default = "default_client_cert_header")]
    pub client_cert_header: String,
}

fn default_role_source() -> String {
    "none".to_string()
}

fn default_client_cert_header() -> String {
    "X-SSL-Client-Cert".to_string()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            role_source: default_role_source(),
            client_cert_header: default_client_cert_header(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format; values other than `json` and `compact` mean pretty
    #[serde(default = "default_log_format", deserialize_with = "deserialize_log_format")]
    pub format: LogFormat,
    /// Log file path. Console only when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Rotated log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_max_log_files() -> usize {
    5
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_files: default_max_log_files(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl LogFormat {
    /// Lenient parse: unknown formats (including printf-style patterns left
    /// over from older deployments) fall back to pretty.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

fn deserialize_log_format<'de, D>(deserializer: D) -> std::result::Result<LogFormat, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(LogFormat::parse_lenient(&raw))
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Path below the API prefix
    #[serde(default = "default_metrics_endpoint")]
    pub endpoint: String,
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_endpoint() -> String {
    "/metrics".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            endpoint: default_metrics_endpoint(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the standard locations and the environment
    ///
    /// Resolution order for the file:
    /// 1. `explicit` (the `--config` flag)
    /// 2. `WM_MONITOR_CONFIG`
    /// 3. The first existing file from [`AppConfig::find_config_file`]
    ///
    /// Unlike most settings a missing file is an error: the `[logging]`
    /// section has no defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let config_path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).map(PathBuf::from).ok())
            .or_else(Self::find_config_file)
            .unwrap_or_else(|| PathBuf::from("config/settings.ini"));

        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load and validate a specific file without environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Configuration file not found at: {:?}", path);
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_ini_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse INI text into a configuration
    pub fn from_ini_str(contents: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Ini))
            .build()
            .context("Invalid INI syntax")?;

        if settings.collect()?.is_empty() {
            anyhow::bail!("No configuration sections found");
        }

        if settings.get_table("logging").is_err() {
            anyhow::bail!("Required 'logging' section missing");
        }

        settings
            .try_deserialize()
            .context("Invalid configuration value")
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Current directory
            PathBuf::from("config/settings.ini"),
            PathBuf::from("settings.ini"),
            // System config directory
            PathBuf::from("/etc/wm-resource-monitor/settings.ini"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("wm-resource-monitor/settings.ini"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.is_file())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("WM_MONITOR_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("WM_MONITOR_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("WM_MONITOR_LOG_FORMAT") {
            self.logging.format = LogFormat::parse_lenient(&format);
        }
    }

    /// The metrics route is registered next to the API index and status
    /// routes, so it must be a literal path that neither of them uses.
    fn validate_metrics_endpoint(&self) -> Result<()> {
        let endpoint = &self.metrics.endpoint;

        if !endpoint.starts_with('/') || endpoint.trim_matches('/').is_empty() {
            anyhow::bail!(
                "Metrics endpoint must be a path starting with '/': {:?}",
                endpoint
            );
        }

        let literal = endpoint
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | '~'));
        if !literal {
            anyhow::bail!(
                "Metrics endpoint may only contain letters, digits and '/-_.~': {:?}",
                endpoint
            );
        }

        if endpoint.trim_end_matches('/') == crate::api::STATUS_ENDPOINT {
            anyhow::bail!(
                "Metrics endpoint {:?} collides with the status endpoint",
                endpoint
            );
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.server.workers == 0 {
            anyhow::bail!("Server workers must be at least 1");
        }

        if self.server.compression_level > 9 {
            anyhow::bail!(
                "Invalid compression level: {}. Must be between 0 and 9",
                self.server.compression_level
            );
        }

        self.server
            .max_request_bytes()
            .context("Invalid server.max_request_size")?;

        self.validate_metrics_endpoint()?;

        if self.security.client_cert_header.trim().is_empty() {
            anyhow::bail!("security.client_cert_header cannot be empty");
        }

        crate::services::role_deriver::from_role_source(&self.security.role_source)
            .context("Invalid security.role_source")?;

        Ok(())
    }
}

/// Parse sizes such as `100MB`, `512 KB` or `1048576` into bytes
pub fn parse_byte_size(value: &str) -> Result<usize> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let amount: usize = digits
        .parse()
        .with_context(|| format!("Invalid size: {:?}", value))?;

    let multiplier: usize = match unit.trim().to_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        other => anyhow::bail!("Unknown size unit {:?} in {:?}", other, value),
    };

    amount
        .checked_mul(multiplier)
        .with_context(|| format!("Size out of range: {:?}", value))
}
