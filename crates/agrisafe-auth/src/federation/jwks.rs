//! Provider signing key cache.
//!
//! Keys from the provider's `jwks_uri` are cached in memory and looked up by
//! `kid`. An unknown `kid` triggers one refetch, so key rotation at the
//! provider is picked up without a restart.

use jsonwebtoken::jwk::{JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;
use url::Url;

use super::discovery::validate_scheme;

/// Maximum accepted JWKS response size.
const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Errors that can occur during JWKS operations.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// A network error occurred while fetching the JWKS.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpError(u16),

    /// The JWKS response could not be parsed as JSON.
    #[error("Failed to parse JWKS: {0}")]
    ParseError(String),

    /// The requested key was not found in the JWKS.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The key could not be converted to a decoding key.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The JWKS URI scheme is not allowed.
    #[error("Invalid URL scheme: only HTTPS is allowed")]
    InvalidScheme,

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

/// Cached signing keys of a single provider.
pub struct ProviderJwks {
    http_client: reqwest::Client,
    jwks_uri: Url,
    keys: RwLock<Option<JwkSet>>,
}

impl ProviderJwks {
    /// Creates an empty cache for `jwks_uri`. Nothing is fetched until the
    /// first lookup.
    ///
    /// # Errors
    ///
    /// Returns `JwksError::InvalidScheme` for non-HTTPS URIs unless
    /// `allow_http` is set.
    pub fn new(
        http_client: reqwest::Client,
        jwks_uri: Url,
        allow_http: bool,
    ) -> Result<Self, JwksError> {
        validate_scheme(&jwks_uri, allow_http).map_err(|_| JwksError::InvalidScheme)?;
        Ok(Self {
            http_client,
            jwks_uri,
            keys: RwLock::new(None),
        })
    }

    #[must_use]
    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    /// Returns the decoding key for `kid` and the algorithm it declares.
    ///
    /// # Errors
    ///
    /// Returns `JwksError::KeyNotFound` if the key is absent even after a
    /// refetch, or a fetch error.
    pub async fn get_key(&self, kid: &str) -> Result<(DecodingKey, Option<Algorithm>), JwksError> {
        if let Some(found) = self.cached_key(kid).await? {
            tracing::trace!(kid, "JWKS cache hit");
            return Ok(found);
        }

        tracing::debug!(kid, jwks_uri = %self.jwks_uri, "JWKS cache miss, refetching");
        self.refresh().await?;

        self.cached_key(kid)
            .await?
            .ok_or_else(|| JwksError::KeyNotFound(kid.to_string()))
    }

    async fn cached_key(
        &self,
        kid: &str,
    ) -> Result<Option<(DecodingKey, Option<Algorithm>)>, JwksError> {
        let keys = self.keys.read().await;
        let Some(jwk) = keys.as_ref().and_then(|set| {
            set.keys.iter().find(|k| {
                k.common.key_id.as_deref() == Some(kid)
                    && !matches!(k.common.public_key_use, Some(PublicKeyUse::Encryption))
            })
        }) else {
            return Ok(None);
        };

        let decoding_key =
            DecodingKey::from_jwk(jwk).map_err(|e| JwksError::InvalidKey(e.to_string()))?;
        Ok(Some((decoding_key, jwk.common.key_algorithm.as_ref().and_then(to_algorithm))))
    }

    /// Fetches the key set and replaces the cached copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a JWKS.
    pub async fn refresh(&self) -> Result<(), JwksError> {
        let response = self
            .http_client
            .get(self.jwks_uri.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                JwksError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(JwksError::HttpError(response.status().as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > MAX_RESPONSE_SIZE
        {
            return Err(JwksError::ResponseTooLarge {
                max_size: MAX_RESPONSE_SIZE,
            });
        }

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| JwksError::ParseError(e.to_string()))?;

        tracing::debug!(jwks_uri = %self.jwks_uri, keys = set.keys.len(), "Cached provider JWKS");
        *self.keys.write().await = Some(set);
        Ok(())
    }
}

/// Maps a JWK `alg` to a signature algorithm. Symmetric algorithms are never
/// accepted from a provider key set.
fn to_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}
