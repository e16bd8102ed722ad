//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::waveform::EngineConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub documents: DocumentsConfig,
}

/// Waveform storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_catalog_file")]
    pub catalog_file: String,

    /// Record length assumed for miniSEED records without blockette 1000
    #[serde(default = "default_record_length")]
    pub default_record_length: u32,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("seisvault").to_string_lossy().to_string())
        .unwrap_or_else(|| "./seisvault_data".to_string())
}

fn default_catalog_file() -> String {
    "catalog.db".to_string()
}

fn default_record_length() -> u32 {
    4096
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            catalog_file: default_catalog_file(),
            default_record_length: default_record_length(),
        }
    }
}

impl StorageConfig {
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(&self.data_dir);
        config.catalog_file = self.catalog_file.clone();
        config.default_record_length = self.default_record_length;
        config
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
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

/// Credentials accepted by `queryauth`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub users: Vec<UserCredentials>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .iter()
            .any(|u| u.username == username && u.password == password)
    }
}

/// Sites and categories the built-in GeoJSON permissions are generated for
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_sites")]
    pub sites: Vec<String>,

    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Events at or above this magnitude stay visible without the site permission
    #[serde(default)]
    pub magnitude_threshold: Option<f64>,
}

fn default_sites() -> Vec<String> {
    [
        "Altdorf",
        "Aschheim",
        "Duerrnhaar",
        "Erding",
        "Freiham",
        "Garching",
        "Hoehenrain",
        "Holzkirchen",
        "Ismaning",
        "Kirchstockach",
        "Kirchweidach",
        "Oberhaching",
        "Poing",
        "Pullach",
        "Riem",
        "Sauerlach",
        "Simbach",
        "Straubing",
        "Taufkirchen",
        "Traunreut",
        "Unterfoehring",
        "Unterhaching",
        "Unterschleissheim",
        "Waldkraiburg",
        "Weilheim",
        "UNKNOWN",
        "PUBLIC",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_categories() -> Vec<String> {
    ["Bohransatzpunkt", "Bohrpfad", "Stoerung", "Bewilligungsfeld", "Gemeinden"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            sites: default_sites(),
            categories: default_categories(),
            magnitude_threshold: None,
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

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
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
            dirs::config_dir().map(|p| p.join("seisvault").join("config.toml")),
            Some(PathBuf::from("/etc/seisvault/config.toml")),
            Some(PathBuf::from("./config.toml")),
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
        if let Ok(data_dir) = std::env::var("SEISVAULT_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        if let Ok(host) = std::env::var("SEISVAULT_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("SEISVAULT_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        if let Ok(level) = std::env::var("SEISVAULT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SEISVAULT_LOG_FORMAT") {
            self.logging.format = format;
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
    r#"# Seisvault Configuration
#
# Environment variables override these settings:
# - SEISVAULT_DATA_DIR
# - SEISVAULT_API_HOST
# - SEISVAULT_API_PORT
# - SEISVAULT_LOG_LEVEL
# - SEISVAULT_LOG_FORMAT

[storage]
# Directory holding the waveform catalog
data_dir = "~/.local/share/seisvault"

# Catalog database file name inside data_dir
catalog_file = "catalog.db"

# Record length for miniSEED records lacking blockette 1000 (bytes)
default_record_length = 4096

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8080

# Allowed CORS origins (empty allows any origin)
cors_origins = []

# Request timeout in seconds
request_timeout_secs = 300

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Users accepted by /fdsnws/dataselect/1/queryauth
# [[auth.users]]
# username = "analyst"
# password = "secret"

[documents]
# Sites and categories GeoJSON retrieve permissions are generated for
# sites = ["Garching", "Poing", "UNKNOWN", "PUBLIC"]
# categories = ["Bohransatzpunkt", "Bohrpfad", "Stoerung"]

# Only hide events below this magnitude from users without the site permission
# magnitude_threshold = 2.0
"#
    .to_string()
}
