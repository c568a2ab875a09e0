//! Dynamic Client Registration integration tests using wiremock

mod common;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    http_client, mount_authorization_server, mount_unauthorized, protected_resource_body,
    recording_context,
};
use oauth_helpers::commands::register::register_client;
use oauth_helpers::{Config, Discovery, OAuthError, RedirectPolicy, Registrar, ResourceDiscovery};

fn kind(err: &anyhow::Error) -> Option<&OAuthError> {
    err.downcast_ref::<OAuthError>()
}

fn discovery_for(server: &MockServer, scopes: &[&str]) -> Discovery {
    let base = server.uri();
    Discovery {
        requires_oauth: true,
        authorization_endpoint: format!("{}/authorize", base),
        token_endpoint: format!("{}/token", base),
        registration_endpoint: format!("{}/register", base),
        resource_url: format!("{}/mcp", base),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        supports_pkce: true,
        issuer: base,
    }
}

/// A server answering with a public client yields public credentials and
/// receives a well-formed RFC 7591 request.
#[tokio::test]
async fn test_perform_dcr_public_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "client_id": "public-client-123",
            "token_endpoint_auth_method": "none",
            "redirect_uris": ["https://mcp.docker.com/oauth/callback"],
            "grant_types": ["authorization_code", "refresh_token"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, logger) = recording_context();
    let discovery = discovery_for(&server, &["read", "write"]);
    let creds = Registrar::new(http_client(), RedirectPolicy::default())
        .perform_dcr(&ctx, &discovery, "github", "")
        .await
        .expect("registration should succeed");

    assert_eq!(creds.client_id, "public-client-123");
    assert!(creds.is_public);
    assert!(creds.client_secret.is_none());
    assert_eq!(creds.server_url, discovery.resource_url);
    assert_eq!(creds.redirect_uri, "https://mcp.docker.com/oauth/callback");
    assert!(logger.contains("registered public client public-client-123"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["token_endpoint_auth_method"], "none");
    assert_eq!(
        body["grant_types"],
        serde_json::json!(["authorization_code", "refresh_token"])
    );
    assert_eq!(
        body["redirect_uris"],
        serde_json::json!(["https://mcp.docker.com/oauth/callback"])
    );
    assert_eq!(body["client_name"], "OAuth Helpers (github)");
    assert_eq!(body["scope"], "read write");
}

/// A server that issues a secret anyway yields confidential credentials.
#[tokio::test]
async fn test_perform_dcr_confidential_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "client_id": "confidential-client",
            "client_secret": "s3cret",
            "token_endpoint_auth_method": "client_secret_basic"
        })))
        .mount(&server)
        .await;

    let (ctx, _logger) = recording_context();
    let creds = Registrar::new(http_client(), RedirectPolicy::default())
        .perform_dcr(&ctx, &discovery_for(&server, &[]), "srv", "http://localhost:8080/cb")
        .await
        .unwrap();

    assert!(!creds.is_public);
    assert_eq!(creds.client_secret.as_deref(), Some("s3cret"));
    assert_eq!(creds.redirect_uri, "http://localhost:8080/cb");
}

/// Without a registration endpoint nothing is sent.
#[tokio::test]
async fn test_perform_dcr_without_registration_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut discovery = discovery_for(&server, &[]);
    discovery.registration_endpoint = String::new();

    let (ctx, _logger) = recording_context();
    let err = Registrar::new(http_client(), RedirectPolicy::default())
        .perform_dcr(&ctx, &discovery, "test-server", "")
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), Some(OAuthError::Configuration(_))));
}

/// A rejected redirect URI fails before any request.
#[tokio::test]
async fn test_perform_dcr_rejects_redirect_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (ctx, _logger) = recording_context();
    let err = Registrar::new(http_client(), RedirectPolicy::default())
        .perform_dcr(
            &ctx,
            &discovery_for(&server, &[]),
            "srv",
            "https://evil.mcp.docker.com/callback",
        )
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), Some(OAuthError::Validation(_))));
}

/// A refusal from the server is a registration error carrying the status.
#[tokio::test]
async fn test_perform_dcr_server_refusal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_redirect_uri"
        })))
        .mount(&server)
        .await;

    let (ctx, _logger) = recording_context();
    let err = Registrar::new(http_client(), RedirectPolicy::default())
        .perform_dcr(&ctx, &discovery_for(&server, &[]), "srv", "")
        .await
        .unwrap_err();

    match kind(&err) {
        Some(OAuthError::Registration(message)) => {
            assert!(message.contains("400"));
            assert!(message.contains("invalid_redirect_uri"));
        }
        other => panic!("expected registration error, got {:?}", other),
    }
    assert!(err.to_string().contains("registering client at"));
}

/// A success response without `client_id` is a registration error.
#[tokio::test]
async fn test_perform_dcr_response_without_client_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "token_endpoint_auth_method": "none"
        })))
        .mount(&server)
        .await;

    let (ctx, _logger) = recording_context();
    let err = Registrar::new(http_client(), RedirectPolicy::default())
        .perform_dcr(&ctx, &discovery_for(&server, &[]), "srv", "")
        .await
        .unwrap_err();

    assert!(matches!(kind(&err), Some(OAuthError::Registration(_))));
}

/// A custom client name prefix is sent to the server.
#[tokio::test]
async fn test_perform_dcr_custom_client_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_partial_json(serde_json::json!({
            "client_name": "Acme Desktop (notion)"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "client_id": "acme"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _logger) = recording_context();
    let creds = Registrar::new(http_client(), RedirectPolicy::default())
        .with_client_name("Acme Desktop")
        .perform_dcr(&ctx, &discovery_for(&server, &[]), "notion", "")
        .await
        .unwrap();

    assert_eq!(creds.client_id, "acme");
}

/// Discovery followed by registration against one mock server.
#[tokio::test]
async fn test_register_client_end_to_end() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_unauthorized(&server, "/mcp", None).await;
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-protected-resource"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(protected_resource_body(&base, &base)),
        )
        .mount(&server)
        .await;
    mount_authorization_server(&server, true).await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "client_id": "e2e-client",
            "token_endpoint_auth_method": "none"
        })))
        .mount(&server)
        .await;

    let (ctx, _logger) = recording_context();
    let report = register_client(
        &Config::default(),
        &ctx,
        &format!("{}/mcp", base),
        "e2e",
        "http://127.0.0.1:9000/callback",
    )
    .await
    .unwrap();

    assert!(report.discovery.requires_oauth);
    assert_eq!(report.credentials.client_id, "e2e-client");
    assert!(report.credentials.is_public);
    assert_eq!(report.credentials.redirect_uri, "http://127.0.0.1:9000/callback");
}

/// Registering against an open resource is refused.
#[tokio::test]
async fn test_register_client_open_resource() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/open"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (ctx, _logger) = recording_context();
    let err = register_client(
        &Config::default(),
        &ctx,
        &format!("{}/open", server.uri()),
        "open",
        "",
    )
    .await
    .unwrap_err();

    assert!(matches!(kind(&err), Some(OAuthError::Configuration(_))));
}

/// The discovered endpoints work end to end through the library API.
#[tokio::test]
async fn test_discovery_then_dcr_via_library() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_unauthorized(
        &server,
        "/api",
        Some(&format!(
            r#"Bearer resource_metadata="{}/.well-known/oauth-protected-resource""#,
            base
        )),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-protected-resource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "resource": base,
            "authorization_server": base,
            "scopes": ["mcp"]
        })))
        .mount(&server)
        .await;
    mount_authorization_server(&server, true).await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_partial_json(serde_json::json!({ "scope": "mcp" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "client_id": "lib-client"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let http = http_client();
    let (ctx, _logger) = recording_context();
    let discovery = ResourceDiscovery::new(http.clone())
        .discover(&ctx, &format!("{}/api", base))
        .await
        .unwrap();
    assert!(discovery.supports_registration());

    let creds = Registrar::new(http, RedirectPolicy::default())
        .perform_dcr(&ctx, &discovery, "lib", "")
        .await
        .unwrap();
    assert_eq!(creds.client_id, "lib-client");
}
