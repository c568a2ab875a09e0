//! oauth-helpers - OAuth discovery and client registration CLI
//!
#![doc = "oauth-helpers - OAuth discovery and client registration CLI"]
#![doc = "Main entry point for the oauth-helpers application."]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use oauth_helpers::cli::{Cli, Commands};
use oauth_helpers::commands;
use oauth_helpers::config::{Config, DEFAULT_CONFIG_PATH};
use oauth_helpers::context::OAuthContext;
use oauth_helpers::logging::{init_tracing, TracingLogger};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let config = Config::load(config_path, &cli)?;

    init_tracing(&config.logging, cli.verbose)?;

    // Validate configuration
    config.validate()?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let mut ctx = OAuthContext::new()
        .with_logger(Arc::new(TracingLogger))
        .with_cancellation(cancel);
    if let Some(secs) = cli.timeout {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    // Execute command
    match cli.command {
        Commands::Discover { resource_url } => {
            commands::discover::run_discover(config, ctx, resource_url).await
        }
        Commands::Register {
            resource_url,
            server,
            redirect_uri,
        } => {
            commands::register::run_register(config, ctx, resource_url, server, redirect_uri)
                .await
        }
        Commands::ParseHeader { header } => commands::inspect::run_parse_header(header),
        Commands::CheckRedirect { uri } => commands::inspect::run_check_redirect(config, uri),
    }
}

/// Cancel `token` on the first Ctrl-C
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });
}
