//! Error types for oauth-helpers
//!
//! This module defines the error taxonomy used throughout discovery and
//! registration, using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for OAuth discovery and registration operations
///
/// Library functions return [`Result`], an `anyhow` alias, so stage context
/// can be layered on top of these variants. Callers recover the variant with
/// [`error_kind`] or `err.downcast_ref::<OAuthError>()`.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// Malformed `WWW-Authenticate` header or JSON body
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required endpoint or setting is missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A redirect URI was rejected by the allowlist
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport or connection failure
    #[error("Network error: {0}")]
    Network(String),

    /// Unexpected HTTP status or missing required metadata field
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The registration endpoint refused or garbled the registration
    #[error("Registration error: {0}")]
    Registration(String),

    /// The caller cancelled the operation or its deadline elapsed
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl OAuthError {
    /// Returns `true` for protocol-level failures, including registration
    /// refusals.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Registration(_))
    }

    /// Returns `true` when the operation was cancelled or timed out.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Result type alias for oauth-helpers operations
///
/// Uses `anyhow::Error` so each pipeline stage can attach context while the
/// underlying [`OAuthError`] stays reachable through downcasting.
pub type Result<T> = anyhow::Result<T>;

/// Returns the [`OAuthError`] carried by `err`, looking through any context
/// layers added on the way up.
///
/// # Examples
///
/// ```
/// use anyhow::Context;
/// use oauth_helpers::error::{error_kind, OAuthError};
///
/// let err = Err::<(), _>(OAuthError::Network("refused".to_string()))
///     .context("fetching authorization server metadata")
///     .unwrap_err();
///
/// assert!(matches!(error_kind(&err), Some(OAuthError::Network(_))));
/// ```
pub fn error_kind(err: &anyhow::Error) -> Option<&OAuthError> {
    err.downcast_ref::<OAuthError>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_parse_error_display() {
        let error = OAuthError::Parse("empty header".to_string());
        assert_eq!(error.to_string(), "Parse error: empty header");
    }

    #[test]
    fn test_configuration_error_display() {
        let error = OAuthError::Configuration("no registration endpoint".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: no registration endpoint"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let error = OAuthError::Validation("host not allowed".to_string());
        assert_eq!(error.to_string(), "Validation error: host not allowed");
    }

    #[test]
    fn test_cancelled_error_display() {
        let error = OAuthError::Cancelled("deadline exceeded".to_string());
        assert_eq!(error.to_string(), "Operation cancelled: deadline exceeded");
        assert!(error.is_cancelled());
    }

    #[test]
    fn test_registration_is_protocol_error() {
        assert!(OAuthError::Registration("400".to_string()).is_protocol());
        assert!(OAuthError::Protocol("500".to_string()).is_protocol());
        assert!(!OAuthError::Network("refused".to_string()).is_protocol());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: OAuthError = json_error.into();
        assert!(matches!(error, OAuthError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: OAuthError = yaml_error.into();
        assert!(matches!(error, OAuthError::Yaml(_)));
    }

    #[test]
    fn test_error_kind_survives_context() {
        let err = Err::<(), _>(OAuthError::Protocol("status 404".to_string()))
            .context("fetching authorization server metadata")
            .unwrap_err();

        assert!(matches!(error_kind(&err), Some(OAuthError::Protocol(_))));
        assert!(format!("{err:#}").contains("status 404"));
    }

    #[test]
    fn test_error_kind_none_for_foreign_errors() {
        let err = anyhow::anyhow!("something else");
        assert!(error_kind(&err).is_none());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OAuthError>();
    }
}
