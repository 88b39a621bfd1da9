//! Error types for OIDC provider operations.

use super::discovery::DiscoveryError;
use super::jwks::JwksError;
use crate::AuthError;

/// Errors raised while talking to the OIDC provider or checking its tokens.
///
/// These are converted to [`AuthError`] at the federator boundary: setup
/// failures become `Configuration`, callback-time failures become
/// `IdTokenVerificationFailed`.
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    /// Failed to fetch or validate the discovery document.
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Failed to fetch or use the provider's signing keys.
    #[error("JWKS error: {0}")]
    Jwks(#[from] JwksError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// A configured or discovered endpoint is not a valid URL.
    #[error("Invalid endpoint {name}: {message}")]
    InvalidEndpoint {
        /// Which endpoint.
        name: &'static str,
        /// Parse failure.
        message: String,
    },

    /// The ID token has no `kid` header.
    #[error("ID token is missing key ID (kid) header")]
    MissingKeyId,

    /// The ID token is signed with an algorithm we do not accept.
    #[error("Unsupported ID token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The ID token header and the provider key disagree on the algorithm.
    #[error("ID token algorithm does not match the provider key")]
    AlgorithmMismatch,

    /// The ID token expired, allowing for clock skew.
    #[error("ID token has expired")]
    TokenExpired,

    /// The ID token was issued in the future, allowing for clock skew.
    #[error("ID token is not yet valid")]
    TokenNotYetValid,

    /// JWT decoding or claim validation failed.
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl FederationError {
    /// Converts a setup-time failure.
    #[must_use]
    pub fn into_configuration_error(self) -> AuthError {
        AuthError::configuration(self.to_string())
    }

    /// Converts a failure raised while checking an ID token.
    #[must_use]
    pub fn into_verification_error(self) -> AuthError {
        AuthError::id_token_verification_failed(self.to_string())
    }
}
