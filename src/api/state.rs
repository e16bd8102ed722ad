//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{ApiConfig as ApiSection, AuthConfig};
use crate::documents::PluginRegistry;
use crate::waveform::WaveformEngine;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Waveform engine answering dataselect queries
    pub engine: Arc<WaveformEngine>,
    /// Registered document types
    pub documents: Arc<PluginRegistry>,
    /// Users accepted by `queryauth`
    pub auth: Arc<AuthConfig>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<WaveformEngine>, documents: Arc<PluginRegistry>, config: ApiConfig) -> Self {
        Self {
            engine,
            documents,
            auth: Arc::new(AuthConfig::default()),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Builder: set the credentials accepted by `queryauth`
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Arc::new(auth);
        self
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 300,
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&ApiSection> for ApiConfig {
    fn from(section: &ApiSection) -> Self {
        Self {
            host: section.host.clone(),
            port: section.port,
            request_timeout_secs: section.request_timeout_secs,
            cors_origins: section.cors_origins.clone(),
        }
    }
}
