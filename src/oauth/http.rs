//! HTTP plumbing shared by discovery and registration
//!
//! Every request and every body read goes through
//! [`OAuthContext::guard`] so cancellation and deadlines are honoured at each
//! network step. Transport failures map to [`OAuthError::Network`], non-2xx
//! statuses to [`OAuthError::Protocol`] and undecodable bodies to
//! [`OAuthError::Parse`].

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use url::Url;

use crate::context::OAuthContext;
use crate::error::{OAuthError, Result};

/// Sends `request` under the context's cancellation and deadline.
pub(crate) async fn send(
    ctx: &OAuthContext,
    stage: &str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    let response = ctx
        .guard(stage, request.send())
        .await?
        .map_err(|e| OAuthError::Network(format!("{stage}: {e}")))?;
    Ok(response)
}

/// Reads the full body as text under the context's cancellation and
/// deadline.
pub(crate) async fn read_text(
    ctx: &OAuthContext,
    stage: &str,
    response: reqwest::Response,
) -> Result<String> {
    let body = ctx
        .guard(stage, response.text())
        .await?
        .map_err(|e| OAuthError::Network(format!("{stage}: failed to read body: {e}")))?;
    Ok(body)
}

/// GETs `url` and decodes a JSON document of type `T`.
///
/// `what` names the document in error messages.
pub(crate) async fn get_json<T: DeserializeOwned>(
    ctx: &OAuthContext,
    http: &reqwest::Client,
    url: &Url,
    what: &str,
) -> Result<T> {
    tracing::debug!(url = %url, "fetching {}", what);

    let request = http.get(url.clone()).header(ACCEPT, "application/json");
    let response = send(ctx, what, request).await?;

    let status = response.status();
    if !status.is_success() {
        return Err(OAuthError::Protocol(format!("{what} endpoint {url} returned {status}")).into());
    }

    let body = read_text(ctx, what, response).await?;
    let document = serde_json::from_str(&body)
        .map_err(|e| OAuthError::Parse(format!("failed to parse {what} from {url}: {e}")))?;
    Ok(document)
}

/// Returns `scheme://host[:port]` for `url`.
pub(crate) fn origin(url: &Url) -> Result<Url> {
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(OAuthError::Configuration(format!("URL {url} has no usable origin")).into());
    }
    let origin = Url::parse(&origin.ascii_serialization())
        .map_err(|e| OAuthError::Configuration(format!("invalid origin for {url}: {e}")))?;
    Ok(origin)
}

/// Builds `<origin of url>/.well-known/<suffix>`.
pub(crate) fn well_known(url: &Url, suffix: &str) -> Result<Url> {
    let mut target = origin(url)?;
    target.set_path(&format!("/.well-known/{suffix}"));
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_drops_path_query_and_fragment() {
        let url = Url::parse("https://api.example.com:8443/mcp/v1?x=1#frag").unwrap();
        assert_eq!(
            origin(&url).unwrap().as_str(),
            "https://api.example.com:8443/"
        );
    }

    #[test]
    fn test_well_known_uses_origin() {
        let url = Url::parse("http://127.0.0.1:4000/mcp").unwrap();
        assert_eq!(
            well_known(&url, "oauth-protected-resource").unwrap().as_str(),
            "http://127.0.0.1:4000/.well-known/oauth-protected-resource"
        );
    }

    #[test]
    fn test_origin_rejects_opaque_urls() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        assert!(origin(&url).is_err());
    }
}
