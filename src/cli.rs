//! Command-line interface definition for oauth-helpers
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for discovery, registration and the offline checks.

use clap::{Parser, Subcommand};

/// oauth-helpers - discover OAuth requirements and bootstrap clients
///
/// Probes a protected resource, locates its authorization server and
/// optionally registers a public OAuth client with it.
#[derive(Parser, Debug, Clone)]
#[command(name = "oauth-helpers")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "OAUTH_HELPERS_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Abort network calls after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Override the client name sent during registration
    #[arg(long)]
    pub client_name: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for oauth-helpers
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Discover the OAuth requirements of a resource
    Discover {
        /// URL of the protected resource
        resource_url: String,
    },

    /// Discover a resource and register a client with its authorization server
    Register {
        /// URL of the protected resource
        resource_url: String,

        /// Identifier of the server, used in the registered client name
        #[arg(short, long)]
        server: String,

        /// Redirect URI to register (defaults to the configured callback)
        #[arg(short, long, default_value = "")]
        redirect_uri: String,
    },

    /// Parse a WWW-Authenticate header value and print its challenges
    ParseHeader {
        /// Raw header value
        header: String,
    },

    /// Check a redirect URI against the configured allowlist
    CheckRedirect {
        /// Redirect URI to check
        uri: String,
    },
}

impl Cli {
    /// Parse CLI arguments from the environment
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
