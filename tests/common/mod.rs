//! Shared helpers for the wiremock-backed integration tests.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oauth_helpers::{OAuthContext, RecordingLogger};

/// Returns a protected resource metadata body naming `auth_server`.
#[allow(dead_code)]
pub fn protected_resource_body(resource: &str, auth_server: &str) -> serde_json::Value {
    serde_json::json!({
        "resource": resource,
        "authorization_servers": [auth_server]
    })
}

/// Returns authorization server metadata rooted at `base_url`.
#[allow(dead_code)]
pub fn authorization_server_body(base_url: &str, with_registration: bool) -> serde_json::Value {
    let mut body = serde_json::json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{}/authorize", base_url),
        "token_endpoint": format!("{}/token", base_url),
        "response_types_supported": ["code"],
        "code_challenge_methods_supported": ["S256"]
    });
    if with_registration {
        body["registration_endpoint"] = serde_json::json!(format!("{}/register", base_url));
    }
    body
}

/// Mounts a `401` at `resource_path`, optionally with a challenge header.
#[allow(dead_code)]
pub async fn mount_unauthorized(server: &MockServer, resource_path: &str, challenge: Option<&str>) {
    let mut response = ResponseTemplate::new(401);
    if let Some(challenge) = challenge {
        response = response.insert_header("WWW-Authenticate", challenge);
    }
    Mock::given(method("GET"))
        .and(path(resource_path))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mounts the RFC 8414 well-known document for `server` itself.
#[allow(dead_code)]
pub async fn mount_authorization_server(server: &MockServer, with_registration: bool) {
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-authorization-server"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(authorization_server_body(&server.uri(), with_registration)),
        )
        .mount(server)
        .await;
}

/// Context whose log lines are kept for assertions.
#[allow(dead_code)]
pub fn recording_context() -> (OAuthContext, Arc<RecordingLogger>) {
    let logger = Arc::new(RecordingLogger::new());
    let ctx = OAuthContext::new().with_logger(logger.clone());
    (ctx, logger)
}

#[allow(dead_code)]
pub fn http_client() -> Arc<reqwest::Client> {
    Arc::new(reqwest::Client::new())
}
