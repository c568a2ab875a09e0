//! Configuration management for oauth-helpers
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OAuthError, Result};
use crate::oauth::redirect::RedirectPolicy;
use crate::oauth::registration::DEFAULT_CLIENT_NAME;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Main configuration structure for oauth-helpers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Redirect URI allowlist applied before registration
    #[serde(default)]
    pub redirect: RedirectPolicy,

    /// Dynamic Client Registration settings
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// Outbound HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dynamic Client Registration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Prefix of the client name sent to the authorization server
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
        }
    }
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds; unset means no timeout
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("oauth-helpers/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    /// Build the shared reqwest client described by this configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent.clone());
        if let Some(secs) = self.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(OAuthError::from)?;
        Ok(client)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed command-line arguments
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            OAuthError::Configuration(format!("Failed to read config file {}: {}", path, e))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            OAuthError::Configuration(format!("Failed to parse config {}: {}", path, e)).into()
        })
    }

    fn apply_env_vars(&mut self) {
        if let Ok(hosts) = std::env::var("OAUTH_HELPERS_PRODUCTION_HOSTS") {
            self.redirect.production_hosts = split_list(&hosts);
        }

        if let Ok(hosts) = std::env::var("OAUTH_HELPERS_LOOPBACK_HOSTS") {
            self.redirect.loopback_hosts = split_list(&hosts);
        }

        if let Ok(uri) = std::env::var("OAUTH_HELPERS_DEFAULT_REDIRECT_URI") {
            self.redirect.default_redirect_uri = uri;
        }

        if let Ok(name) = std::env::var("OAUTH_HELPERS_CLIENT_NAME") {
            self.registration.client_name = name;
        }

        if let Ok(timeout) = std::env::var("OAUTH_HELPERS_HTTP_TIMEOUT") {
            if let Ok(value) = timeout.parse() {
                self.http.timeout_seconds = Some(value);
            } else {
                tracing::warn!("Invalid OAUTH_HELPERS_HTTP_TIMEOUT: {}", timeout);
            }
        }

        if let Ok(level) = std::env::var("OAUTH_HELPERS_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }

        if cli.json_logs {
            self.logging.json_format = true;
        }

        if let Some(name) = &cli.client_name {
            self.registration.client_name = name.clone();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Configuration`] if the client name is empty, the
    /// default redirect URI is not accepted by the configured allowlist, the
    /// HTTP timeout is zero or the log level is unknown
    pub fn validate(&self) -> Result<()> {
        if self.registration.client_name.trim().is_empty() {
            return Err(
                OAuthError::Configuration("client_name cannot be empty".to_string()).into(),
            );
        }

        if self.redirect.default_redirect_uri.is_empty() {
            return Err(OAuthError::Configuration(
                "default_redirect_uri cannot be empty".to_string(),
            )
            .into());
        }

        if let Err(e) = self.redirect.validate(&self.redirect.default_redirect_uri) {
            return Err(OAuthError::Configuration(format!(
                "default_redirect_uri is not allowed by the redirect policy: {}",
                e
            ))
            .into());
        }

        if self.http.timeout_seconds == Some(0) {
            return Err(OAuthError::Configuration(
                "http.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(OAuthError::Configuration(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
