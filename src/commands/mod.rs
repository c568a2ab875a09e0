/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint:

- `discover` -- probe a resource and print its OAuth requirements
- `register` -- discover a resource, then register a public client
- `inspect`  -- offline checks (header parsing, redirect allowlist)

Every handler prints a pretty JSON document on stdout; diagnostics go to
stderr through tracing.
*/

use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::context::OAuthContext;
use crate::error::{OAuthError, Result};

/// Print `value` as pretty JSON on stdout
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(OAuthError::from)?;
    println!("{}", rendered);
    Ok(())
}

fn http_client(config: &Config) -> Result<Arc<reqwest::Client>> {
    Ok(Arc::new(config.http.build_client()?))
}

// Discover command handler
pub mod discover {
    //! Resource discovery handler.

    use super::*;
    use crate::oauth::discovery::{Discovery, ResourceDiscovery};

    /// Discover the OAuth requirements of `resource_url`
    ///
    /// # Errors
    ///
    /// Propagates every discovery failure unchanged
    pub async fn discover_resource(
        config: &Config,
        ctx: &OAuthContext,
        resource_url: &str,
    ) -> Result<Discovery> {
        let http = http_client(config)?;
        ResourceDiscovery::new(http).discover(ctx, resource_url).await
    }

    /// Run discovery and print the result
    pub async fn run_discover(config: Config, ctx: OAuthContext, resource_url: String) -> Result<()> {
        tracing::info!("Discovering OAuth requirements for {}", resource_url);
        let discovery = discover_resource(&config, &ctx, &resource_url).await?;
        print_json(&discovery)
    }
}

// Register command handler
pub mod register {
    //! Discovery followed by Dynamic Client Registration.

    use super::*;
    use crate::oauth::discovery::{Discovery, ResourceDiscovery};
    use crate::oauth::registration::{ClientCredentials, Registrar};

    /// Outcome printed by the `register` command
    #[derive(Debug, Clone, Serialize)]
    pub struct RegistrationReport {
        /// What discovery found for the resource
        pub discovery: Discovery,
        /// Credentials issued by the authorization server
        pub credentials: ClientCredentials,
    }

    /// Discover `resource_url` and register a client for `server`
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Configuration`] when the resource does not
    /// require OAuth or its server offers no registration endpoint, and
    /// propagates every discovery and registration failure
    pub async fn register_client(
        config: &Config,
        ctx: &OAuthContext,
        resource_url: &str,
        server: &str,
        redirect_uri: &str,
    ) -> Result<RegistrationReport> {
        let http = http_client(config)?;

        let discovery = ResourceDiscovery::new(http.clone())
            .discover(ctx, resource_url)
            .await?;

        if !discovery.requires_oauth {
            return Err(OAuthError::Configuration(format!(
                "{} does not require OAuth; nothing to register",
                resource_url
            ))
            .into());
        }

        let registrar = Registrar::new(http, config.redirect.clone())
            .with_client_name(config.registration.client_name.clone());
        let credentials = registrar
            .perform_dcr(ctx, &discovery, server, redirect_uri)
            .await?;

        Ok(RegistrationReport {
            discovery,
            credentials,
        })
    }

    /// Run discovery plus registration and print the report
    pub async fn run_register(
        config: Config,
        ctx: OAuthContext,
        resource_url: String,
        server: String,
        redirect_uri: String,
    ) -> Result<()> {
        tracing::info!("Registering client for {} ({})", server, resource_url);
        let report = register_client(&config, &ctx, &resource_url, &server, &redirect_uri).await?;
        print_json(&report)
    }
}

// Offline inspection handlers
pub mod inspect {
    //! Commands that never touch the network.

    use super::*;
    use crate::oauth::challenge::{
        find_required_scopes, find_resource_metadata_url, parse_challenges, Challenge,
    };

    /// Parsed view of a `WWW-Authenticate` header
    #[derive(Debug, Clone, Serialize)]
    pub struct HeaderReport {
        /// Challenges in header order
        pub challenges: Vec<Challenge>,
        /// First `resource_metadata` parameter, empty if absent
        pub resource_metadata: String,
        /// Scopes from the first `scope` parameter
        pub scopes: Vec<String>,
    }

    /// Result of checking a redirect URI
    #[derive(Debug, Clone, Serialize)]
    pub struct RedirectReport {
        /// The URI as given
        pub uri: String,
        /// What would be registered (the default when `uri` is empty)
        pub effective_uri: String,
        /// Whether the allowlist accepts it
        pub allowed: bool,
        /// Rejection reason when not allowed
        #[serde(skip_serializing_if = "Option::is_none")]
        pub reason: Option<String>,
    }

    /// Parse `header` into a [`HeaderReport`]
    pub fn inspect_header(header: &str) -> Result<HeaderReport> {
        let challenges = parse_challenges(header)?;
        Ok(HeaderReport {
            resource_metadata: find_resource_metadata_url(&challenges),
            scopes: find_required_scopes(&challenges),
            challenges,
        })
    }

    /// Check `uri` against the configured redirect allowlist
    pub fn check_redirect(config: &Config, uri: &str) -> RedirectReport {
        match config.redirect.resolve(uri) {
            Ok(effective_uri) => RedirectReport {
                uri: uri.to_string(),
                effective_uri,
                allowed: true,
                reason: None,
            },
            Err(e) => RedirectReport {
                uri: uri.to_string(),
                effective_uri: String::new(),
                allowed: false,
                reason: Some(e.to_string()),
            },
        }
    }

    /// Print the parsed challenges of `header`
    pub fn run_parse_header(header: String) -> Result<()> {
        let report = inspect_header(&header)?;
        print_json(&report)
    }

    /// Print the allowlist verdict for `uri`, failing when it is rejected
    pub fn run_check_redirect(config: Config, uri: String) -> Result<()> {
        let report = check_redirect(&config, &uri);
        print_json(&report)?;
        match report.reason {
            Some(reason) => Err(OAuthError::Validation(reason).into()),
            None => Ok(()),
        }
    }
}
