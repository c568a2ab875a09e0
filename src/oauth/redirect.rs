//! Redirect URI allowlist
//!
//! Dynamic Client Registration must never register a callback URL an
//! attacker could have slipped in. [`RedirectPolicy`] accepts exactly two
//! kinds of host:
//!
//! - loopback hosts (`localhost`, `127.0.0.1`, `::1`) over `http` or
//!   `https`, any port, any path;
//! - the configured production hosts over `https` only, any path.
//!
//! Hosts are compared for exact equality. Suffix matching would let
//! `evil.mcp.docker.com` through.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::error::{OAuthError, Result};

/// Production host allowed by the default policy.
pub const DEFAULT_PRODUCTION_HOST: &str = "mcp.docker.com";

/// Callback used when the caller does not supply a redirect URI.
pub const DEFAULT_REDIRECT_URI: &str = "https://mcp.docker.com/oauth/callback";

/// Allowed redirect hosts and the default callback.
///
/// # Examples
///
/// ```
/// use oauth_helpers::oauth::redirect::RedirectPolicy;
///
/// let policy = RedirectPolicy::default();
/// assert!(policy.validate("http://localhost:5000/callback").is_ok());
/// assert!(policy.validate("https://mcp.docker.com/oauth/callback").is_ok());
/// assert!(policy.validate("https://evil.mcp.docker.com/callback").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectPolicy {
    /// Hosts accepted over `http` and `https`.
    #[serde(default = "default_loopback_hosts")]
    pub loopback_hosts: Vec<String>,

    /// Hosts accepted over `https` only.
    #[serde(default = "default_production_hosts")]
    pub production_hosts: Vec<String>,

    /// Callback registered when the caller passes an empty redirect URI.
    #[serde(default = "default_redirect_uri")]
    pub default_redirect_uri: String,
}

fn default_loopback_hosts() -> Vec<String> {
    vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "::1".to_string(),
    ]
}

fn default_production_hosts() -> Vec<String> {
    vec![DEFAULT_PRODUCTION_HOST.to_string()]
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            loopback_hosts: default_loopback_hosts(),
            production_hosts: default_production_hosts(),
            default_redirect_uri: default_redirect_uri(),
        }
    }
}

impl RedirectPolicy {
    /// Checks `uri` against the allowlist. An empty string is accepted and
    /// means "use the default callback".
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Validation`] when the URI does not parse, uses a
    /// scheme other than `http`/`https`, carries a fragment, or names a host
    /// outside the allowlist.
    pub fn validate(&self, uri: &str) -> Result<()> {
        if uri.is_empty() {
            return Ok(());
        }

        let url = Url::parse(uri)
            .map_err(|e| OAuthError::Validation(format!("invalid redirect URI {uri:?}: {e}")))?;

        let https = match url.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(OAuthError::Validation(format!(
                    "redirect URI scheme {other:?} is not http or https"
                ))
                .into())
            }
        };

        if url.fragment().is_some() {
            return Err(
                OAuthError::Validation("redirect URI must not contain a fragment".to_string())
                    .into(),
            );
        }

        let host = match url.host() {
            Some(host) => normalize_url_host(&host),
            None => {
                return Err(
                    OAuthError::Validation(format!("redirect URI {uri:?} has no host")).into(),
                )
            }
        };

        if self
            .loopback_hosts
            .iter()
            .any(|allowed| normalize_host(allowed) == host)
        {
            return Ok(());
        }

        if self
            .production_hosts
            .iter()
            .any(|allowed| normalize_host(allowed) == host)
        {
            if https {
                return Ok(());
            }
            return Err(OAuthError::Validation(format!(
                "redirect URI host {host} requires https"
            ))
            .into());
        }

        Err(OAuthError::Validation(format!(
            "redirect URI host {host} is not in the allowlist"
        ))
        .into())
    }

    /// Returns the URI to register: the default callback for an empty
    /// input, otherwise `uri` after validation.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Validation`] under the same conditions as
    /// [`RedirectPolicy::validate`].
    pub fn resolve(&self, uri: &str) -> Result<String> {
        if uri.is_empty() {
            return Ok(self.default_redirect_uri.clone());
        }
        self.validate(uri)?;
        Ok(uri.to_string())
    }
}

/// Validates `uri` against the default policy.
///
/// # Errors
///
/// See [`RedirectPolicy::validate`].
///
/// # Examples
///
/// ```
/// use oauth_helpers::oauth::redirect::validate_redirect_uri;
///
/// assert!(validate_redirect_uri("").is_ok());
/// assert!(validate_redirect_uri("http://[::1]:8080/callback").is_ok());
/// assert!(validate_redirect_uri("https://attacker.ngrok.io/callback").is_err());
/// ```
pub fn validate_redirect_uri(uri: &str) -> Result<()> {
    RedirectPolicy::default().validate(uri)
}

fn normalize_url_host(host: &Host<&str>) -> String {
    match host {
        Host::Domain(domain) => domain.to_ascii_lowercase(),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => addr.to_string(),
    }
}

/// Lowercases a configured host, strips IPv6 brackets and canonicalises IP
/// literals so `[0:0::1]` and `::1` compare equal.
fn normalize_host(host: &str) -> String {
    let trimmed = host
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    match trimmed.parse::<IpAddr>() {
        Ok(addr) => addr.to_string(),
        Err(_) => trimmed.to_ascii_lowercase(),
    }
}
