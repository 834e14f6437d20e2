//! Configuration loading and constants.
//!
//! Loads the server configuration from a TOML file. `AppConfig` is the root
//! configuration struct; it selects the certificate provider and turns the
//! remaining settings into server options.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::certificate::{
    CertificateProvider, InsecureProvider, TemporaryConfig, TemporaryProvider,
};
use crate::http::{self, ServerOption};
use crate::middleware;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "webserver=info,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Default validity of generated certificates, in hours
pub const DEFAULT_CERT_VALID_FOR_HOURS: u64 = 24;

/// Upper bound for `tls.valid_for_hours`: 100 years
pub const MAX_CERT_VALID_FOR_HOURS: u64 = 100 * 365 * 24;

/// Default read and write timeout, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    pub http: HttpServerConfig,
    /// Certificate provisioning
    #[serde(default)]
    pub tls: TlsSettings,
    /// Cross-origin settings
    #[serde(default)]
    pub cors: CorsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    pub port: u16,
    #[serde(default = "HttpServerConfig::default_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "HttpServerConfig::default_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl HttpServerConfig {
    fn default_timeout_ms() -> u64 {
        DEFAULT_TIMEOUT_MS
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Which certificate provider to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Plain HTTP
    #[default]
    None,
    /// Self-signed certificate generated at startup
    Temporary,
}

/// Certificate provisioning settings
#[derive(Debug, Clone, Deserialize)]
pub struct TlsSettings {
    #[serde(default)]
    pub provider: ProviderKind,
    /// Domains the certificate is requested for
    #[serde(default)]
    pub domains: Vec<String>,
    /// Validity of generated certificates (default: 24 hours)
    #[serde(default = "TlsSettings::default_valid_for_hours")]
    pub valid_for_hours: u64,
    /// Generate Ed25519 keys instead of RSA-2048
    #[serde(default)]
    pub use_ed25519: bool,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            domains: Vec::new(),
            valid_for_hours: Self::default_valid_for_hours(),
            use_ed25519: false,
        }
    }
}

impl TlsSettings {
    fn default_valid_for_hours() -> u64 {
        DEFAULT_CERT_VALID_FOR_HOURS
    }

    pub fn temporary_config(&self) -> TemporaryConfig {
        TemporaryConfig {
            valid_for: Duration::from_secs(self.valid_for_hours.saturating_mul(60 * 60)),
            use_ed25519: self.use_ed25519,
        }
    }

    /// Instantiate the configured provider.
    pub fn provider(&self) -> Box<dyn CertificateProvider> {
        match self.provider {
            ProviderKind::None => Box::new(InsecureProvider::new()),
            ProviderKind::Temporary => Box::new(TemporaryProvider::new(self.temporary_config())),
        }
    }
}

/// Cross-origin settings. An empty list allows every origin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        contents.parse()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http.read_timeout_ms == 0 || self.http.write_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "http.read_timeout_ms and http.write_timeout_ms must be greater than zero"
                    .to_string(),
            ));
        }
        if self.tls.valid_for_hours == 0 || self.tls.valid_for_hours > MAX_CERT_VALID_FOR_HOURS {
            return Err(ConfigError::Validation(format!(
                "tls.valid_for_hours must be between 1 and {MAX_CERT_VALID_FOR_HOURS}"
            )));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Validation(format!(
                "logging.format must be \"text\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Server options derived from this configuration: CORS and timeouts.
    pub fn server_options(&self) -> Vec<ServerOption> {
        vec![
            http::middleware([
                middleware::request_id(),
                middleware::cors(&self.cors.allowed_origins),
            ]),
            http::read_timeout(self.http.read_timeout()),
            http::write_timeout(self.http.write_timeout()),
        ]
    }
}

impl std::str::FromStr for AppConfig {
    type Err = ConfigError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
