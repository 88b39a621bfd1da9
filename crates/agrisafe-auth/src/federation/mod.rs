//! External OIDC provider federation.
//!
//! Provider metadata is discovered once at construction; the federator is
//! never usable in a partially initialised state.

pub mod discovery;
pub mod error;
pub mod federator;
pub mod jwks;

pub use discovery::{DiscoveryClient, DiscoveryError, ProviderMetadata};
pub use error::FederationError;
pub use federator::{
    CallbackParams, CsrfState, ExternalProfile, IdTokenClaims, LoginRedirect, OidcFederator,
    TokenResponse, extract_id_token, extract_profile,
};
pub use jwks::{JwksError, ProviderJwks};
