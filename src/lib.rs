//! oauth-helpers - OAuth discovery and client bootstrap library
//!
//! This library finds out whether a protected resource requires OAuth,
//! locates its authorization server and registers a public client with it.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `oauth`: challenge parsing, discovery, registration and the redirect
//!   allowlist
//! - `context`: per-call logger, cancellation and deadline
//! - `logging`: the injectable `Logger` capability and tracing setup
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and its handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use oauth_helpers::{OAuthContext, RedirectPolicy, Registrar, ResourceDiscovery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http = Arc::new(reqwest::Client::new());
//!     let ctx = OAuthContext::new();
//!
//!     let discovery = ResourceDiscovery::new(http.clone())
//!         .discover(&ctx, "https://api.example.com/mcp")
//!         .await?;
//!
//!     if discovery.supports_registration() {
//!         let creds = Registrar::new(http, RedirectPolicy::default())
//!             .perform_dcr(&ctx, &discovery, "example", "")
//!             .await?;
//!         println!("registered {}", creds.client_id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod oauth;

// Re-export commonly used types
pub use config::Config;
pub use context::OAuthContext;
pub use error::{error_kind, OAuthError, Result};
pub use logging::{wrap_logger, Logger, NoopLogger, RecordingLogger, StderrLogger, TracingLogger};
pub use oauth::{
    find_required_scopes, find_resource_metadata_url, parse_challenges, validate_redirect_uri,
    AuthorizationServerMetadata, Challenge, ClientCredentials, DcrRequest, DcrResponse, Discovery,
    ProtectedResourceMetadata, RedirectPolicy, Registrar, ResourceDiscovery,
};
