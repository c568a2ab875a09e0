//! Dynamic Client Registration (RFC 7591)
//!
//! Registers this client with the authorization server found by
//! [`discovery`](super::discovery) and returns the issued credentials.
//! Registration always asks for a public client
//! (`token_endpoint_auth_method = "none"`); a server that issues a secret
//! anyway yields confidential credentials.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use crate::context::OAuthContext;
use crate::error::{OAuthError, Result};
use crate::oauth::discovery::Discovery;
use crate::oauth::http;
use crate::oauth::redirect::RedirectPolicy;

/// Client name used when none is configured.
pub const DEFAULT_CLIENT_NAME: &str = "OAuth Helpers";

/// Grant types requested for every registration.
pub const GRANT_TYPES: [&str; 2] = ["authorization_code", "refresh_token"];

/// Token endpoint auth method for public clients.
pub const AUTH_METHOD_NONE: &str = "none";

/// Registration request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcrRequest {
    /// Callback URLs to register.
    pub redirect_uris: Vec<String>,

    /// Requested grant types.
    pub grant_types: Vec<String>,

    /// Requested response types.
    #[serde(default)]
    pub response_types: Vec<String>,

    /// How the client authenticates at the token endpoint.
    pub token_endpoint_auth_method: String,

    /// Human-readable client name.
    pub client_name: String,

    /// Space-separated scopes, omitted when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
}

/// Registration response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DcrResponse {
    /// Issued client identifier.
    #[serde(default)]
    pub client_id: String,

    /// Issued secret, absent for public clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// When the client id was issued (seconds since the epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id_issued_at: Option<i64>,

    /// When the secret expires, `0` meaning never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,

    /// Registered callback URLs.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Registered grant types.
    #[serde(default)]
    pub grant_types: Vec<String>,

    /// Registered token endpoint auth method.
    #[serde(default)]
    pub token_endpoint_auth_method: String,

    /// Registered client name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Credentials issued by a successful registration.
///
/// `is_public` is `true` exactly when `client_secret` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    /// Issued client identifier.
    pub client_id: String,

    /// Issued secret for confidential clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Whether this is a public client.
    pub is_public: bool,

    /// Resource URL these credentials were registered for.
    pub server_url: String,

    /// Callback URL that was registered.
    pub redirect_uri: String,
}

impl ClientCredentials {
    fn from_response(response: DcrResponse, server_url: &str, redirect_uri: String) -> Self {
        let client_secret = response.client_secret.filter(|s| !s.is_empty());
        Self {
            client_id: response.client_id,
            is_public: client_secret.is_none(),
            client_secret,
            server_url: server_url.to_string(),
            redirect_uri,
        }
    }
}

/// Performs Dynamic Client Registration against discovered servers.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use oauth_helpers::context::OAuthContext;
/// use oauth_helpers::oauth::discovery::ResourceDiscovery;
/// use oauth_helpers::oauth::redirect::RedirectPolicy;
/// use oauth_helpers::oauth::registration::Registrar;
///
/// # async fn example() -> oauth_helpers::error::Result<()> {
/// let http = Arc::new(reqwest::Client::new());
/// let ctx = OAuthContext::new();
///
/// let discovery = ResourceDiscovery::new(http.clone())
///     .discover(&ctx, "https://api.example.com/mcp")
///     .await?;
///
/// let registrar = Registrar::new(http, RedirectPolicy::default());
/// let creds = registrar.perform_dcr(&ctx, &discovery, "example", "").await?;
/// println!("client_id: {}", creds.client_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Registrar {
    http: Arc<reqwest::Client>,
    policy: RedirectPolicy,
    client_name: String,
}

impl Registrar {
    /// Creates a registrar that validates redirect URIs with `policy`.
    pub fn new(http: Arc<reqwest::Client>, policy: RedirectPolicy) -> Self {
        Self {
            http,
            policy,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
        }
    }

    /// Overrides the client name prefix sent during registration.
    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    /// Returns the redirect policy in use.
    pub fn policy(&self) -> &RedirectPolicy {
        &self.policy
    }

    /// Builds the registration request for `server_identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Validation`] when `redirect_uri` is rejected by
    /// the policy.
    pub fn build_request(
        &self,
        discovery: &Discovery,
        server_identifier: &str,
        redirect_uri: &str,
    ) -> Result<DcrRequest> {
        let redirect_uri = self.policy.resolve(redirect_uri)?;

        Ok(DcrRequest {
            redirect_uris: vec![redirect_uri],
            grant_types: GRANT_TYPES.iter().map(|g| g.to_string()).collect(),
            response_types: vec!["code".to_string()],
            token_endpoint_auth_method: AUTH_METHOD_NONE.to_string(),
            client_name: client_name_for(&self.client_name, server_identifier),
            scope: discovery.scopes.join(" "),
        })
    }

    /// Registers a client for `server_identifier` at the discovered
    /// registration endpoint.
    ///
    /// An empty `redirect_uri` registers the policy's default callback.
    ///
    /// # Errors
    ///
    /// - [`OAuthError::Configuration`] if the discovery has no registration
    ///   endpoint. No request is sent.
    /// - [`OAuthError::Validation`] if the redirect URI is rejected. No
    ///   request is sent.
    /// - [`OAuthError::Network`] on transport failure.
    /// - [`OAuthError::Registration`] for a non-2xx response, an undecodable
    ///   body, or a response without `client_id`.
    /// - [`OAuthError::Cancelled`] if the context is cancelled.
    pub async fn perform_dcr(
        &self,
        ctx: &OAuthContext,
        discovery: &Discovery,
        server_identifier: &str,
        redirect_uri: &str,
    ) -> Result<ClientCredentials> {
        if discovery.registration_endpoint.is_empty() {
            return Err(OAuthError::Configuration(format!(
                "authorization server for {} does not offer dynamic client registration",
                display_or(&discovery.resource_url, server_identifier)
            ))
            .into());
        }

        let request = self.build_request(discovery, server_identifier, redirect_uri)?;
        let endpoint = discovery.registration_endpoint.as_str();

        ctx.logger().info(format_args!(
            "registering client {:?} at {}",
            request.client_name, endpoint
        ));

        let response = self
            .register(ctx, endpoint, &request)
            .await
            .with_context(|| format!("registering client at {endpoint}"))?;

        let redirect_uri = request.redirect_uris.into_iter().next().unwrap_or_default();
        let credentials =
            ClientCredentials::from_response(response, &discovery.resource_url, redirect_uri);

        ctx.logger().info(format_args!(
            "registered {} client {}",
            if credentials.is_public {
                "public"
            } else {
                "confidential"
            },
            credentials.client_id
        ));

        Ok(credentials)
    }

    async fn register(
        &self,
        ctx: &OAuthContext,
        endpoint: &str,
        request: &DcrRequest,
    ) -> Result<DcrResponse> {
        tracing::debug!(endpoint, "posting registration request");

        let builder = self
            .http
            .post(endpoint)
            .header(ACCEPT, "application/json")
            .json(request);
        let response = http::send(ctx, "client registration", builder).await?;

        let status = response.status();
        let body = http::read_text(ctx, "client registration", response).await?;

        if !status.is_success() {
            return Err(OAuthError::Registration(format!(
                "registration endpoint returned {status}: {}",
                body.trim()
            ))
            .into());
        }

        let parsed: DcrResponse = serde_json::from_str(&body).map_err(|e| {
            OAuthError::Registration(format!("failed to parse registration response: {e}"))
        })?;

        if parsed.client_id.is_empty() {
            return Err(OAuthError::Registration(
                "registration response is missing client_id".to_string(),
            )
            .into());
        }

        Ok(parsed)
    }
}

fn client_name_for(prefix: &str, server_identifier: &str) -> String {
    match (prefix.trim(), server_identifier.trim()) {
        ("", server) => server.to_string(),
        (prefix, "") => prefix.to_string(),
        (prefix, server) => format!("{prefix} ({server})"),
    }
}

fn display_or<'a>(primary: &'a str, fallback: &'a str) -> &'a str {
    if primary.is_empty() {
        fallback
    } else {
        primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registrar() -> Registrar {
        Registrar::new(Arc::new(reqwest::Client::new()), RedirectPolicy::default())
    }

    fn discovery_with_scopes(scopes: &[&str]) -> Discovery {
        Discovery {
            requires_oauth: true,
            registration_endpoint: "https://auth.example.com/register".to_string(),
            resource_url: "https://api.example.com".to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_request_defaults() {
        let request = registrar()
            .build_request(&discovery_with_scopes(&["read", "write"]), "github", "")
            .unwrap();

        assert_eq!(
            request.redirect_uris,
            vec!["https://mcp.docker.com/oauth/callback"]
        );
        assert_eq!(request.grant_types, vec!["authorization_code", "refresh_token"]);
        assert_eq!(request.token_endpoint_auth_method, "none");
        assert_eq!(request.client_name, "OAuth Helpers (github)");
        assert_eq!(request.scope, "read write");
    }

    #[test]
    fn test_build_request_rejects_bad_redirect() {
        let err = registrar()
            .build_request(&discovery_with_scopes(&[]), "github", "https://evil.com/cb")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OAuthError>(),
            Some(OAuthError::Validation(_))
        ));
    }

    #[test]
    fn test_request_omits_empty_scope() {
        let request = registrar()
            .build_request(&discovery_with_scopes(&[]), "srv", "http://localhost:3000/cb")
            .unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("scope").is_none());
        assert_eq!(json["redirect_uris"][0], "http://localhost:3000/cb");
    }

    #[test]
    fn test_registrar_keeps_configured_policy() {
        let policy = RedirectPolicy {
            production_hosts: vec!["app.example.com".to_string()],
            default_redirect_uri: "https://app.example.com/cb".to_string(),
            ..Default::default()
        };
        let registrar = Registrar::new(Arc::new(reqwest::Client::new()), policy.clone());
        assert_eq!(registrar.policy(), &policy);

        let request = registrar
            .build_request(&discovery_with_scopes(&[]), "srv", "")
            .unwrap();
        assert_eq!(request.redirect_uris, vec!["https://app.example.com/cb"]);
    }

    #[test]
    fn test_client_name_for() {
        assert_eq!(client_name_for("App", "srv"), "App (srv)");
        assert_eq!(client_name_for("", "srv"), "srv");
        assert_eq!(client_name_for("App", " "), "App");
    }

    #[test]
    fn test_credentials_public_when_secret_missing_or_empty() {
        let response = DcrResponse {
            client_id: "abc".to_string(),
            client_secret: Some(String::new()),
            ..Default::default()
        };
        let creds = ClientCredentials::from_response(response, "https://api", "cb".to_string());
        assert!(creds.is_public);
        assert!(creds.client_secret.is_none());
    }

    #[test]
    fn test_credentials_confidential_when_secret_present() {
        let response = DcrResponse {
            client_id: "abc".to_string(),
            client_secret: Some("s3cret".to_string()),
            ..Default::default()
        };
        let creds = ClientCredentials::from_response(response, "https://api", "cb".to_string());
        assert!(!creds.is_public);
        assert_eq!(creds.client_secret.as_deref(), Some("s3cret"));
        assert_eq!(creds.server_url, "https://api");
    }

    #[tokio::test]
    async fn test_perform_dcr_without_endpoint_is_configuration_error() {
        let discovery = Discovery {
            requires_oauth: true,
            authorization_endpoint: "https://auth.example.com/authorize".to_string(),
            token_endpoint: "https://auth.example.com/token".to_string(),
            ..Default::default()
        };

        let err = registrar()
            .perform_dcr(&OAuthContext::new(), &discovery, "test-server", "")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OAuthError>(),
            Some(OAuthError::Configuration(_))
        ));
    }
}
