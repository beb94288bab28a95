//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via DALCLIENT_CONFIG)
//! 3. Environment variables

use dal_protocol::{ResponseType, SessionExpiry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the DAL server, e.g. `http://kddart.example.org/dal/`.
    pub base_url: String,
    /// Format requested for responses.
    pub response_type: ResponseType,
    /// Whether the session ends on logout or expires by itself.
    pub session_expiry: SessionExpiry,
    /// Switch to the user's first group straight after login.
    pub auto_switch_group: bool,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
    /// Export file polling.
    pub export: ExportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            response_type: ResponseType::Xml,
            session_expiry: SessionExpiry::AutoExpire,
            auto_switch_group: false,
            request_timeout_ms: 60_000,
            accept_invalid_certs: false,
            export: ExportConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for a server with defaults for everything else.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("DALCLIENT_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.base_url = normalize_base_url(&config.base_url);
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let mut config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        config.base_url = normalize_base_url(&config.base_url);
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.base_url = normalize_base_url(&config.base_url);
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DALCLIENT_BASE_URL") {
            self.base_url = url;
        }

        if let Ok(rt) = std::env::var("DALCLIENT_RESPONSE_TYPE") {
            if let Ok(parsed) = rt.parse() {
                self.response_type = parsed;
            }
        }

        if let Ok(expiry) = std::env::var("DALCLIENT_SESSION_EXPIRY") {
            if let Ok(parsed) = expiry.parse() {
                self.session_expiry = parsed;
            }
        }

        if let Ok(switch) = std::env::var("DALCLIENT_AUTO_SWITCH_GROUP") {
            self.auto_switch_group = switch == "1" || switch.to_lowercase() == "true";
        }

        if let Ok(timeout) = std::env::var("DALCLIENT_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.request_timeout_ms = secs.saturating_mul(1_000);
            }
        }

        if let Ok(insecure) = std::env::var("DALCLIENT_ACCEPT_INVALID_CERTS") {
            self.accept_invalid_certs = insecure == "1" || insecure.to_lowercase() == "true";
        }

        self.export.apply_env_overrides();
    }

    /// Checks the configuration for values the client cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "base_url must not be empty".to_string(),
            ));
        }
        if !self.response_type.is_requestable() {
            return Err(ConfigError::ValidationError(format!(
                "response_type '{}' cannot be requested from the server",
                self.response_type
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.export.max_delay_ms < self.export.initial_delay_ms {
            return Err(ConfigError::ValidationError(
                "export.max_delay_ms must not be below export.initial_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(&base_url.into());
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_session_expiry(mut self, expiry: SessionExpiry) -> Self {
        self.session_expiry = expiry;
        self
    }

    pub fn with_auto_switch_group(mut self, enabled: bool) -> Self {
        self.auto_switch_group = enabled;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_export(mut self, export: ExportConfig) -> Self {
        self.export = export;
        self
    }

    /// Returns request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Ensures a non-empty base URL ends with `/` so commands can be appended.
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// Export file polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Wait before the first attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound of the doubling wait between attempts, in milliseconds.
    pub max_delay_ms: u64,
    /// Give up after this many seconds.
    pub timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            timeout_secs: 120,
        }
    }
}

impl ExportConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(timeout) = std::env::var("DALCLIENT_EXPORT_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.timeout_secs = secs;
            }
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
