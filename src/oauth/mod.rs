//! OAuth discovery and client bootstrap
//!
//! # Module Layout
//!
//! - [`challenge`]    -- `WWW-Authenticate` challenge parsing
//! - [`discovery`]    -- RFC 9728 / RFC 8414 resource discovery with the
//!   well-known fallback
//! - [`registration`] -- RFC 7591 Dynamic Client Registration
//! - [`redirect`]     -- redirect URI allowlist guarding registration

pub mod challenge;
pub mod discovery;
mod http;
pub mod redirect;
pub mod registration;

pub use challenge::{find_required_scopes, find_resource_metadata_url, parse_challenges, Challenge};
pub use discovery::{
    AuthorizationServerMetadata, Discovery, ProtectedResourceMetadata, ResourceDiscovery,
};
pub use redirect::{validate_redirect_uri, RedirectPolicy};
pub use registration::{ClientCredentials, DcrRequest, DcrResponse, Registrar};
