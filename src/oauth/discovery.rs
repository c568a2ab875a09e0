//! OAuth resource discovery (RFC 9728 / RFC 8414)
//!
//! Works out whether a resource needs OAuth and, if so, where its
//! authorization server lives.
//!
//! # Discovery sequence
//!
//! 1. Probe the resource with an unauthenticated `GET`. Anything other than
//!    `401 Unauthorized` ends discovery: `5xx` is an error, every other
//!    status means no OAuth is required.
//! 2. If the `401` carries a `WWW-Authenticate` header with a
//!    `resource_metadata` parameter, that URL locates the protected resource
//!    metadata. Otherwise fall back to
//!    `<resource origin>/.well-known/oauth-protected-resource`.
//! 3. Fetch the protected resource metadata and read its authorization
//!    server.
//! 4. Fetch the authorization server metadata, either directly when the
//!    identifier already points at a `/.well-known/` document, or from
//!    `<server origin>/.well-known/oauth-authorization-server`.
//! 5. Assemble a [`Discovery`].
//!
//! Nothing is cached between calls.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::context::OAuthContext;
use crate::error::{OAuthError, Result};
use crate::oauth::challenge::{
    find_required_scopes, find_resource_metadata_url, parse_challenges, Challenge,
};
use crate::oauth::http;

/// Context attached to every authorization server metadata failure.
///
/// Integrators match on this text, so it must not change.
pub const AUTH_SERVER_METADATA_CONTEXT: &str = "fetching authorization server metadata";

/// PKCE method that marks a server as PKCE capable.
pub const PKCE_S256: &str = "S256";

const PROTECTED_RESOURCE_SUFFIX: &str = "oauth-protected-resource";
const AUTHORIZATION_SERVER_SUFFIX: &str = "oauth-authorization-server";

// ---------------------------------------------------------------------------
// Protected Resource Metadata (RFC 9728)
// ---------------------------------------------------------------------------

/// Metadata document describing which authorization server protects a
/// resource.
///
/// Both the singular `authorization_server` form and the RFC 9728
/// `authorization_servers` array are accepted.
///
/// # Examples
///
/// ```
/// use oauth_helpers::oauth::discovery::ProtectedResourceMetadata;
///
/// let json = r#"{
///     "resource": "https://api.example.com",
///     "authorization_servers": ["https://auth.example.com"],
///     "scopes_supported": ["read", "write"]
/// }"#;
///
/// let meta: ProtectedResourceMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(meta.authorization_server(), Some("https://auth.example.com"));
/// assert_eq!(meta.scopes_supported.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The protected resource identifier.
    #[serde(default)]
    pub resource: String,

    /// Single authorization server identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_server: Option<String>,

    /// Authorization server identifiers (RFC 9728).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorization_servers: Vec<String>,

    /// Scopes the resource expects, in server order.
    #[serde(default, alias = "scopes", skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ProtectedResourceMetadata {
    /// Returns the authorization server to use: the singular field if set,
    /// otherwise the first non-empty array entry.
    pub fn authorization_server(&self) -> Option<&str> {
        self.authorization_server
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.authorization_servers
                    .iter()
                    .map(String::as_str)
                    .find(|s| !s.is_empty())
            })
    }
}

// ---------------------------------------------------------------------------
// Authorization Server Metadata (RFC 8414)
// ---------------------------------------------------------------------------

/// Metadata document describing an OAuth authorization server.
///
/// Endpoint fields default to empty so a missing endpoint surfaces as a
/// protocol error naming the field rather than a decode error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier.
    #[serde(default)]
    pub issuer: String,

    /// Authorization endpoint URL.
    #[serde(default)]
    pub authorization_endpoint: String,

    /// Token endpoint URL.
    #[serde(default)]
    pub token_endpoint: String,

    /// Dynamic Client Registration endpoint (RFC 7591), if offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// Supported PKCE challenge methods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_challenge_methods_supported: Vec<String>,

    /// Supported scopes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    /// Supported grant types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant_types_supported: Vec<String>,

    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl AuthorizationServerMetadata {
    /// Returns `true` when `S256` is an advertised PKCE method.
    pub fn supports_pkce(&self) -> bool {
        self.code_challenge_methods_supported
            .iter()
            .any(|m| m == PKCE_S256)
    }

    /// Returns the registration endpoint, treating an empty string as absent.
    pub fn registration_endpoint(&self) -> Option<&str> {
        self.registration_endpoint
            .as_deref()
            .filter(|s| !s.is_empty())
    }

    fn ensure_required_endpoints(&self) -> Result<()> {
        if self.authorization_endpoint.is_empty() {
            return Err(OAuthError::Protocol(
                "authorization server metadata is missing authorization_endpoint".to_string(),
            )
            .into());
        }
        if self.token_endpoint.is_empty() {
            return Err(OAuthError::Protocol(
                "authorization server metadata is missing token_endpoint".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Discovery result
// ---------------------------------------------------------------------------

/// Everything a client needs to start an OAuth flow against a resource.
///
/// When `requires_oauth` is `true`, `authorization_endpoint` and
/// `token_endpoint` are always non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    /// Whether the resource answered the probe with `401`.
    pub requires_oauth: bool,

    /// Authorization endpoint of the discovered server.
    #[serde(default)]
    pub authorization_endpoint: String,

    /// Token endpoint of the discovered server.
    #[serde(default)]
    pub token_endpoint: String,

    /// Registration endpoint, empty when the server offers no DCR.
    #[serde(default)]
    pub registration_endpoint: String,

    /// The resource URL that was probed.
    #[serde(default)]
    pub resource_url: String,

    /// Scopes to request, in server order.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Whether the server advertises PKCE `S256`.
    #[serde(default)]
    pub supports_pkce: bool,

    /// Issuer identifier of the authorization server.
    #[serde(default)]
    pub issuer: String,
}

impl Discovery {
    /// Result for a resource that did not ask for authentication.
    pub fn not_required(resource_url: impl Into<String>) -> Self {
        Self {
            resource_url: resource_url.into(),
            ..Self::default()
        }
    }

    /// Returns `true` when Dynamic Client Registration is possible.
    pub fn supports_registration(&self) -> bool {
        !self.registration_endpoint.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ResourceDiscovery
// ---------------------------------------------------------------------------

enum ProbeOutcome {
    NotRequired(StatusCode),
    Unauthorized { www_authenticate: Option<String> },
}

/// Runs the discovery pipeline for one resource at a time.
///
/// Holds only the HTTP client; every call starts from scratch.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use oauth_helpers::context::OAuthContext;
/// use oauth_helpers::oauth::discovery::ResourceDiscovery;
///
/// # async fn example() -> oauth_helpers::error::Result<()> {
/// let discovery = ResourceDiscovery::new(Arc::new(reqwest::Client::new()));
/// let result = discovery
///     .discover(&OAuthContext::new(), "https://api.example.com/mcp")
///     .await?;
/// if result.requires_oauth {
///     println!("token endpoint: {}", result.token_endpoint);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResourceDiscovery {
    http: Arc<reqwest::Client>,
}

impl ResourceDiscovery {
    /// Creates a discovery engine using `http` for every request.
    pub fn new(http: Arc<reqwest::Client>) -> Self {
        Self { http }
    }

    /// Discovers the OAuth requirements of `resource_url`.
    ///
    /// # Errors
    ///
    /// - [`OAuthError::Configuration`] if `resource_url` is not an absolute
    ///   URL.
    /// - [`OAuthError::Network`] on transport failure.
    /// - [`OAuthError::Protocol`] for a `5xx` probe, a non-2xx metadata
    ///   response, or metadata missing a required field.
    /// - [`OAuthError::Parse`] for undecodable metadata.
    /// - [`OAuthError::Cancelled`] if the context is cancelled.
    ///
    /// Authorization server failures carry the
    /// [`AUTH_SERVER_METADATA_CONTEXT`] message.
    pub async fn discover(&self, ctx: &OAuthContext, resource_url: &str) -> Result<Discovery> {
        let resource = Url::parse(resource_url).map_err(|e| {
            OAuthError::Configuration(format!("invalid resource URL {resource_url:?}: {e}"))
        })?;

        let www_authenticate = match self
            .probe(ctx, &resource)
            .await
            .with_context(|| format!("probing {resource}"))?
        {
            ProbeOutcome::NotRequired(status) => {
                ctx.logger().info(format_args!(
                    "{resource} answered {status}; OAuth not required"
                ));
                return Ok(Discovery::not_required(resource_url));
            }
            ProbeOutcome::Unauthorized { www_authenticate } => www_authenticate,
        };

        let (metadata_url, challenges) =
            self.resolve_metadata_url(ctx, &resource, www_authenticate.as_deref())?;

        let resource_metadata = self
            .fetch_protected_resource_metadata(ctx, &metadata_url)
            .await
            .with_context(|| format!("fetching protected resource metadata from {metadata_url}"))?;

        let auth_server = resource_metadata
            .authorization_server()
            .ok_or_else(|| {
                OAuthError::Protocol(format!(
                    "protected resource metadata at {metadata_url} names no authorization server"
                ))
            })?
            .to_string();

        let server_metadata = self
            .fetch_authorization_server_metadata(ctx, &auth_server)
            .await
            .with_context(|| format!("{AUTH_SERVER_METADATA_CONTEXT} for {auth_server}"))?;

        let scopes = if resource_metadata.scopes_supported.is_empty() {
            find_required_scopes(&challenges)
        } else {
            resource_metadata.scopes_supported
        };

        let discovery = Discovery {
            requires_oauth: true,
            supports_pkce: server_metadata.supports_pkce(),
            registration_endpoint: server_metadata
                .registration_endpoint()
                .unwrap_or_default()
                .to_string(),
            authorization_endpoint: server_metadata.authorization_endpoint,
            token_endpoint: server_metadata.token_endpoint,
            resource_url: resource_url.to_string(),
            scopes,
            issuer: server_metadata.issuer,
        };

        ctx.logger().info(format_args!(
            "discovered authorization server {} for {} (pkce: {}, registration: {})",
            auth_server,
            resource,
            discovery.supports_pkce,
            discovery.supports_registration()
        ));

        Ok(discovery)
    }

    /// Fetches and decodes a protected resource metadata document.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Network`], [`OAuthError::Protocol`],
    /// [`OAuthError::Parse`] or [`OAuthError::Cancelled`].
    pub async fn fetch_protected_resource_metadata(
        &self,
        ctx: &OAuthContext,
        metadata_url: &Url,
    ) -> Result<ProtectedResourceMetadata> {
        http::get_json(ctx, &self.http, metadata_url, "protected resource metadata").await
    }

    /// Fetches authorization server metadata for `auth_server`.
    ///
    /// If `auth_server` already points at a `/.well-known/` document it is
    /// fetched as is; otherwise the RFC 8414 well-known URL is derived from
    /// its origin.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Protocol`] for an unusable identifier, a non-2xx
    /// response or a document missing its authorization or token endpoint,
    /// plus the transport errors of any fetch.
    pub async fn fetch_authorization_server_metadata(
        &self,
        ctx: &OAuthContext,
        auth_server: &str,
    ) -> Result<AuthorizationServerMetadata> {
        let url = authorization_server_metadata_url(auth_server)?;
        let metadata: AuthorizationServerMetadata =
            http::get_json(ctx, &self.http, &url, "authorization server metadata").await?;
        metadata.ensure_required_endpoints()?;
        Ok(metadata)
    }

    async fn probe(&self, ctx: &OAuthContext, resource: &Url) -> Result<ProbeOutcome> {
        tracing::debug!(url = %resource, "probing resource");

        let response = http::send(ctx, "resource probe", self.http.get(resource.clone())).await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let values: Vec<&str> = response
                .headers()
                .get_all(WWW_AUTHENTICATE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect();
            let www_authenticate = (!values.is_empty()).then(|| values.join(", "));
            return Ok(ProbeOutcome::Unauthorized { www_authenticate });
        }

        if status.is_server_error() {
            return Err(OAuthError::Protocol(format!(
                "resource probe returned {status}"
            ))
            .into());
        }

        Ok(ProbeOutcome::NotRequired(status))
    }

    /// Picks the protected resource metadata URL from the challenge, or the
    /// well-known fallback when the challenge cannot supply one.
    fn resolve_metadata_url(
        &self,
        ctx: &OAuthContext,
        resource: &Url,
        www_authenticate: Option<&str>,
    ) -> Result<(Url, Vec<Challenge>)> {
        let logger = ctx.logger();

        let Some(header) = www_authenticate else {
            logger.warn(format_args!(
                "no WWW-Authenticate header present in 401 response from {resource}"
            ));
            let fallback = http::well_known(resource, PROTECTED_RESOURCE_SUFFIX)?;
            logger.info(format_args!(
                "FALLBACK: trying well-known endpoint {fallback}"
            ));
            return Ok((fallback, Vec::new()));
        };

        logger.info(format_args!("WWW-Authenticate header present: {header}"));

        let challenges = match parse_challenges(header) {
            Ok(challenges) => challenges,
            Err(e) => {
                logger.warn(format_args!("ignoring malformed WWW-Authenticate header: {e:#}"));
                Vec::new()
            }
        };

        let advertised = find_resource_metadata_url(&challenges);
        if !advertised.is_empty() {
            match resource.join(&advertised) {
                Ok(url) => return Ok((url, challenges)),
                Err(e) => logger.warn(format_args!(
                    "ignoring unusable resource_metadata {advertised:?}: {e}"
                )),
            }
        } else {
            logger.warn(format_args!(
                "WWW-Authenticate header carries no resource_metadata parameter"
            ));
        }

        let fallback = http::well_known(resource, PROTECTED_RESOURCE_SUFFIX)?;
        logger.info(format_args!(
            "FALLBACK: trying well-known endpoint {fallback}"
        ));
        Ok((fallback, challenges))
    }
}

/// Returns the URL holding the metadata of `auth_server`.
fn authorization_server_metadata_url(auth_server: &str) -> Result<Url> {
    let url = Url::parse(auth_server).map_err(|e| {
        OAuthError::Protocol(format!(
            "invalid authorization server identifier {auth_server:?}: {e}"
        ))
    })?;

    if url.path().contains("/.well-known/") {
        return Ok(url);
    }

    http::well_known(&url, AUTHORIZATION_SERVER_SUFFIX)
}
