//! OIDC authorization-code flow driver.
//!
//! A login attempt goes through these steps in order; any failure aborts it:
//!
//! 1. [`begin_login`](OidcFederator::begin_login): mint a CSRF state and the
//!    provider redirect URL
//! 2. [`CsrfState::verify`]: compare the returned state with the stored one
//! 3. [`exchange_code`](OidcFederator::exchange_code): call the token endpoint
//! 4. [`extract_id_token`]: pull the raw ID token out of the response
//! 5. [`verify_id_token`](OidcFederator::verify_id_token): check signature and
//!    claims against the provider keys
//! 6. [`extract_profile`]: read email, name and subject

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, Validation, decode_header};
use serde::{Deserialize, Serialize};
use url::Url;

use super::discovery::{DiscoveryClient, ProviderMetadata};
use super::error::FederationError;
use super::jwks::ProviderJwks;
use crate::clock::Clock;
use crate::config::OidcConfig;
use crate::random::SecureRandom;
use crate::{AuthError, AuthResult};

// =============================================================================
// CSRF State
// =============================================================================

/// One-time CSRF state for a single authorization round trip.
///
/// Verification consumes the value, so a stored state can be checked at most
/// once.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfState(String);

impl CsrfState {
    /// Wraps a state value read back from the client.
    #[must_use]
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks the state returned by the provider and discards this value.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CsrfStateMismatch` unless `received` is
    /// byte-for-byte equal to the stored state. An empty value on either side
    /// never matches.
    pub fn verify(self, received: &str) -> AuthResult<()> {
        if self.0.is_empty() || received.is_empty() {
            tracing::warn!("OIDC callback with an empty state");
            return Err(AuthError::CsrfStateMismatch);
        }
        if constant_time_eq(self.0.as_bytes(), received.as_bytes()) {
            Ok(())
        } else {
            tracing::warn!("OIDC callback state does not match the stored state");
            Err(AuthError::CsrfStateMismatch)
        }
    }
}

impl fmt::Debug for CsrfState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfState(***)")
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// =============================================================================
// Wire Types
// =============================================================================

/// Result of [`OidcFederator::begin_login`].
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    /// Provider authorization URL to redirect the browser to.
    pub authorization_url: Url,
    /// State to store client-side until the callback.
    pub state: CsrfState,
}

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    /// Set by the provider when the user denied consent or the request failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl CallbackParams {
    #[must_use]
    pub fn new(state: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            code: Some(code.into()),
            error: None,
        }
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub expires_in: Option<u64>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Raw ID token. Required for login but optional on the wire.
    #[serde(default)]
    pub id_token: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth error response from the provider.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Verified ID token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,

    pub sub: String,

    /// Audience, either a string or an array on the wire.
    #[serde(deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    pub exp: i64,

    pub iat: i64,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub email_verified: Option<bool>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub preferred_username: Option<String>,
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(vec![s]),
        OneOrMany::Many(v) => Ok(v),
    }
}

/// Profile read from verified ID token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    /// Provider subject identifier.
    pub subject: String,
    pub email: String,
    pub name: String,
    /// The provider's `email_verified` assertion.
    pub email_verified: bool,
}

// =============================================================================
// Federator
// =============================================================================

/// Fully initialised OIDC relying party for one provider.
pub struct OidcFederator {
    client_id: String,
    client_secret: String,
    redirect_url: Url,
    scopes: Vec<String>,
    issuer: String,
    authorization_endpoint: Url,
    token_endpoint: Url,
    jwks: ProviderJwks,
    http_client: reqwest::Client,
    clock: Arc<dyn Clock>,
    random: Arc<dyn SecureRandom>,
    clock_skew: i64,
}

impl OidcFederator {
    /// Runs discovery against the configured issuer and builds the federator.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or advertises unusable endpoints.
    pub async fn discover(
        config: &OidcConfig,
        clock: Arc<dyn Clock>,
        random: Arc<dyn SecureRandom>,
    ) -> Result<Self, FederationError> {
        let http_client = build_http_client(config)?;
        let issuer = parse_endpoint("issuer", &config.issuer)?;
        let metadata = DiscoveryClient::new(http_client.clone(), config.allow_http)
            .discover(&issuer)
            .await?;
        Self::build(config, metadata, http_client, clock, random)
    }

    /// Builds the federator from already known provider metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint is not a valid URL or uses a disallowed
    /// scheme.
    pub fn from_metadata(
        config: &OidcConfig,
        metadata: ProviderMetadata,
        clock: Arc<dyn Clock>,
        random: Arc<dyn SecureRandom>,
    ) -> Result<Self, FederationError> {
        let http_client = build_http_client(config)?;
        Self::build(config, metadata, http_client, clock, random)
    }

    fn build(
        config: &OidcConfig,
        metadata: ProviderMetadata,
        http_client: reqwest::Client,
        clock: Arc<dyn Clock>,
        random: Arc<dyn SecureRandom>,
    ) -> Result<Self, FederationError> {
        let authorization_endpoint =
            parse_endpoint("authorization_endpoint", &metadata.authorization_endpoint)?;
        let token_endpoint = parse_endpoint("token_endpoint", &metadata.token_endpoint)?;
        let jwks_uri = parse_endpoint("jwks_uri", &metadata.jwks_uri)?;
        let redirect_url = parse_endpoint("redirect_url", &config.redirect_url)?;

        let jwks = ProviderJwks::new(http_client.clone(), jwks_uri, config.allow_http)?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url,
            scopes: config.scopes.clone(),
            issuer: metadata.issuer,
            authorization_endpoint,
            token_endpoint,
            jwks,
            http_client,
            clock,
            random,
            clock_skew: i64::try_from(config.clock_skew.as_secs()).unwrap_or(i64::MAX),
        })
    }

    /// Returns the provider issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Step 1: mints a fresh 256-bit state and the authorization URL.
    #[must_use]
    pub fn begin_login(&self) -> LoginRedirect {
        let state = CsrfState(self.random.opaque_base64());

        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", self.redirect_url.as_str())
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state.as_str());

        tracing::debug!(
            authorization_endpoint = %self.authorization_endpoint,
            "Starting OIDC login"
        );

        LoginRedirect {
            authorization_url: url,
            state,
        }
    }

    /// Step 3: exchanges the authorization code at the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CodeExchangeFailed` on transport errors, non-2xx
    /// responses or an unparseable body.
    pub async fn exchange_code(&self, code: &str) -> AuthResult<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        tracing::debug!(token_endpoint = %self.token_endpoint, "Exchanging authorization code");

        let response = self
            .http_client
            .post(self.token_endpoint.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Token endpoint request failed");
                AuthError::code_exchange_failed(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OAuthErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => format!("HTTP {status}"),
            };
            tracing::warn!(status = %status, message = %message, "Provider rejected code exchange");
            return Err(AuthError::code_exchange_failed(message));
        }

        response.json::<TokenResponse>().await.map_err(|e| {
            AuthError::code_exchange_failed(format!("failed to parse token response: {e}"))
        })
    }

    /// Step 5: verifies the ID token signature and claims.
    ///
    /// The token must carry a `kid` naming an asymmetric provider key, be
    /// issued by the provider for our client id, and be unexpired within the
    /// configured clock skew.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IdTokenVerificationFailed` on any failure.
    pub async fn verify_id_token(&self, raw: &str) -> AuthResult<IdTokenClaims> {
        self.verify_id_token_inner(raw)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "ID token verification failed");
                e.into_verification_error()
            })
    }

    async fn verify_id_token_inner(&self, raw: &str) -> Result<IdTokenClaims, FederationError> {
        let header = decode_header(raw)?;
        if !is_asymmetric(header.alg) {
            return Err(FederationError::UnsupportedAlgorithm(format!(
                "{:?}",
                header.alg
            )));
        }
        let kid = header.kid.ok_or(FederationError::MissingKeyId)?;

        let (decoding_key, key_alg) = self.jwks.get_key(&kid).await?;
        if key_alg.is_some_and(|alg| alg != header.alg) {
            return Err(FederationError::AlgorithmMismatch);
        }

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[self.issuer.as_str(), self.issuer.trim_end_matches('/')]);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);

        let claims = jsonwebtoken::decode::<IdTokenClaims>(raw, &decoding_key, &validation)?.claims;

        let now = self.clock.unix_now();
        if now > claims.exp.saturating_add(self.clock_skew) {
            return Err(FederationError::TokenExpired);
        }
        if claims.iat > now.saturating_add(self.clock_skew) {
            return Err(FederationError::TokenNotYetValid);
        }

        tracing::debug!(issuer = %claims.iss, "Verified ID token");
        Ok(claims)
    }

    /// Steps 2 to 6 for one callback.
    ///
    /// `stored` is the state kept client-side since [`begin_login`]; it is
    /// consumed whatever the outcome. The state is checked before anything
    /// else the provider sent.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step. A provider `error` or a
    /// missing `code` behind a valid state is `InvalidInput`.
    ///
    /// [`begin_login`]: OidcFederator::begin_login
    pub async fn complete_login(
        &self,
        stored: Option<CsrfState>,
        params: &CallbackParams,
    ) -> AuthResult<ExternalProfile> {
        let stored = stored.ok_or_else(|| {
            tracing::warn!("OIDC callback without a stored state");
            AuthError::CsrfStateMismatch
        })?;
        stored.verify(params.state.as_deref().unwrap_or_default())?;

        if let Some(error) = &params.error {
            tracing::warn!(provider_error = %error, "Provider returned an error to the callback");
            return Err(AuthError::invalid_input(format!(
                "provider returned error: {error}"
            )));
        }
        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::invalid_input("code is required"))?;

        let response = self.exchange_code(code).await?;
        let raw = extract_id_token(response)?;
        let claims = self.verify_id_token(&raw).await?;
        extract_profile(&claims)
    }
}

/// Step 4: pulls the raw ID token out of the token response.
///
/// # Errors
///
/// Returns `AuthError::MissingIdToken` if the response has none.
pub fn extract_id_token(response: TokenResponse) -> AuthResult<String> {
    match response.id_token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => {
            tracing::warn!("Token response did not include an ID token");
            Err(AuthError::MissingIdToken)
        }
    }
}

/// Step 6: reads the profile from verified claims.
///
/// `sub` and `email` are required. The display name falls back to
/// `preferred_username`, then to the email address.
///
/// # Errors
///
/// Returns `AuthError::MalformedProfileClaims` if a required claim is absent
/// or empty.
pub fn extract_profile(claims: &IdTokenClaims) -> AuthResult<ExternalProfile> {
    if claims.sub.trim().is_empty() {
        return Err(AuthError::malformed_profile_claims("sub is empty"));
    }
    let email = claims
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AuthError::malformed_profile_claims("email claim is missing"))?;

    let name = [claims.name.as_deref(), claims.preferred_username.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|n| !n.is_empty())
        .unwrap_or(email);

    Ok(ExternalProfile {
        subject: claims.sub.clone(),
        email: email.to_string(),
        name: name.to_string(),
        email_verified: claims.email_verified.unwrap_or(false),
    })
}

fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn build_http_client(config: &OidcConfig) -> Result<reqwest::Client, FederationError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| FederationError::HttpClient(e.to_string()))
}

fn parse_endpoint(name: &'static str, value: &str) -> Result<Url, FederationError> {
    Url::parse(value).map_err(|e| FederationError::InvalidEndpoint {
        name,
        message: e.to_string(),
    })
}
