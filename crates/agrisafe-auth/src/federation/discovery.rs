//! OpenID Connect Discovery client.
//!
//! Fetches provider metadata from `{issuer}/.well-known/openid-configuration`
//! once, when the federator is built.
//!
//! # Security Considerations
//!
//! - Only HTTPS issuer URLs are allowed unless `allow_http` is set
//! - The issuer in the document must match the configured issuer
//! - Response size is limited

use serde::{Deserialize, Serialize};
use url::Url;

/// Maximum accepted discovery document size.
const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Provider metadata fields used by the relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// URL that the OP asserts as its Issuer Identifier.
    pub issuer: String,

    pub authorization_endpoint: String,

    pub token_endpoint: String,

    pub jwks_uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

/// Errors that can occur during OIDC discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// A network error occurred while fetching the discovery document.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpError(u16),

    /// The discovery document could not be parsed as JSON.
    #[error("Failed to parse discovery document: {0}")]
    ParseError(String),

    /// The issuer URL could not be parsed or is invalid.
    #[error("Invalid issuer URL: {0}")]
    InvalidIssuer(String),

    /// The issuer in the discovery document does not match the expected issuer.
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The configured issuer URL.
        expected: String,
        /// The issuer URL from the discovery document.
        actual: String,
    },

    /// The issuer URL scheme is not allowed.
    #[error("Invalid URL scheme: {0} (only HTTPS is allowed)")]
    InvalidScheme(String),

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

/// Client for fetching OIDC discovery documents.
pub struct DiscoveryClient {
    http_client: reqwest::Client,
    allow_http: bool,
}

impl DiscoveryClient {
    /// Creates a client that reuses `http_client`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, allow_http: bool) -> Self {
        Self {
            http_client,
            allow_http,
        }
    }

    /// Fetches and validates provider metadata for `issuer`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The issuer URL is not HTTPS (unless `allow_http` is true)
    /// - The document cannot be fetched or parsed
    /// - The issuer in the document does not match
    pub async fn discover(&self, issuer: &Url) -> Result<ProviderMetadata, DiscoveryError> {
        validate_scheme(issuer, self.allow_http)?;

        let discovery_url = build_discovery_url(issuer);

        let response = self
            .http_client
            .get(discovery_url.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(issuer = %issuer, error = %e, "Failed to fetch OIDC discovery");
                DiscoveryError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(DiscoveryError::HttpError(response.status().as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > MAX_RESPONSE_SIZE
        {
            return Err(DiscoveryError::ResponseTooLarge {
                max_size: MAX_RESPONSE_SIZE,
            });
        }

        let metadata: ProviderMetadata = response.json().await.map_err(|e| {
            tracing::warn!(issuer = %issuer, error = %e, "Failed to parse OIDC discovery document");
            DiscoveryError::ParseError(e.to_string())
        })?;

        validate_issuer(&metadata, issuer)?;

        tracing::debug!(issuer = %metadata.issuer, "Discovered OIDC provider configuration");
        Ok(metadata)
    }
}

/// Rejects non-HTTPS URLs unless `allow_http` is set.
pub(crate) fn validate_scheme(url: &Url, allow_http: bool) -> Result<(), DiscoveryError> {
    match url.scheme() {
        "https" => Ok(()),
        "http" if allow_http => Ok(()),
        other => Err(DiscoveryError::InvalidScheme(other.to_string())),
    }
}

/// `{issuer}/.well-known/openid-configuration`, tolerating a trailing slash.
fn build_discovery_url(issuer: &Url) -> Url {
    let mut discovery_url = issuer.clone();
    let path = issuer.path().trim_end_matches('/');
    discovery_url.set_path(&format!("{path}/.well-known/openid-configuration"));
    discovery_url
}

fn validate_issuer(metadata: &ProviderMetadata, expected: &Url) -> Result<(), DiscoveryError> {
    let document_issuer = Url::parse(&metadata.issuer).map_err(|e| {
        DiscoveryError::InvalidIssuer(format!("{} - {}", metadata.issuer, e))
    })?;

    let expected_normalized = expected.as_str().trim_end_matches('/');
    let document_normalized = document_issuer.as_str().trim_end_matches('/');

    if expected_normalized != document_normalized {
        return Err(DiscoveryError::IssuerMismatch {
            expected: expected_normalized.to_string(),
            actual: document_normalized.to_string(),
        });
    }
    Ok(())
}
