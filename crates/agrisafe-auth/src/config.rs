//! Authentication configuration.
//!
//! Covers session token signing, email verification, the optional OIDC
//! provider, cookie attributes and local identity rules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum length of the HMAC signing secret in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Root authentication configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth.token]
/// secret = "change-me-to-at-least-thirty-two-bytes"
/// ttl = "1h"
///
/// [auth.oidc]
/// issuer = "https://accounts.example.com"
/// client_id = "agrisafe"
/// client_secret = "secret"
/// redirect_url = "http://localhost:8080/auth/callback"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session token signing.
    pub token: TokenConfig,

    /// Email verification tokens.
    pub verification: VerificationConfig,

    /// External OIDC provider. Federated login is disabled when absent.
    pub oidc: Option<OidcConfig>,

    /// Session and state cookie attributes.
    pub cookies: CookieConfig,

    /// Local identity rules.
    pub identity: IdentityConfig,
}

/// Session token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC-SHA256 secret. Must be at least 32 bytes.
    pub secret: String,

    /// Value of the `iss` claim, checked on decode.
    pub issuer: String,

    /// Session token lifetime.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "http://localhost:8080".to_string(),
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Email verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Lifetime of an email verification token.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Base URL placed in verification mails; the token is appended as
    /// `?token=`.
    pub link_base_url: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 3600),
            link_base_url: "http://localhost:3000/verify-email".to_string(),
        }
    }
}

/// OIDC relying party configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OidcConfig {
    /// Provider issuer URL. Discovery is fetched from
    /// `{issuer}/.well-known/openid-configuration`.
    pub issuer: String,

    /// Client identifier registered at the provider.
    pub client_id: String,

    /// Client secret registered at the provider.
    pub client_secret: String,

    /// Redirect URI registered at the provider.
    pub redirect_url: String,

    /// Scopes requested at login.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Timeout for discovery, token and JWKS requests.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Allowed clock skew when checking ID token expiry.
    #[serde(default = "default_clock_skew", with = "humantime_serde")]
    pub clock_skew: Duration,

    /// Allow plain-HTTP provider endpoints (development only).
    #[serde(default)]
    pub allow_http: bool,

    /// Lifetime of the CSRF state cookie.
    #[serde(default = "default_state_cookie_max_age", with = "humantime_serde")]
    pub state_cookie_max_age: Duration,
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "profile".to_string(),
        "email".to_string(),
    ]
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_clock_skew() -> Duration {
    Duration::from_secs(60)
}

fn default_state_cookie_max_age() -> Duration {
    Duration::from_secs(600)
}

/// SameSite attribute for auth cookies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

impl From<SameSitePolicy> for cookie::SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => cookie::SameSite::Strict,
            SameSitePolicy::Lax => cookie::SameSite::Lax,
            SameSitePolicy::None => cookie::SameSite::None,
        }
    }
}

/// Cookie attributes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Name of the session token cookie.
    pub session_name: String,

    /// Name of the CSRF state cookie.
    pub state_name: String,

    /// Set the `Secure` attribute.
    pub secure: bool,

    pub same_site: SameSitePolicy,

    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            session_name: "auth_token".to_string(),
            state_name: "auth_state".to_string(),
            secure: false,
            same_site: SameSitePolicy::Lax,
            path: "/".to_string(),
        }
    }
}

/// Local and federated identity rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Honor the provider's `email_verified` claim for OIDC-created users.
    /// When false, federated users start unverified.
    pub trust_provider_email_verification: bool,

    /// Minimum password length for local registration.
    pub min_password_length: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            trust_provider_email_verification: false,
            min_password_length: 8,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the token secret is empty, and
    /// `ConfigError::InvalidValue` for short secrets, zero lifetimes, bad URLs
    /// or incomplete OIDC settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.secret.is_empty() {
            return Err(ConfigError::Missing("auth.token.secret".to_string()));
        }
        if self.token.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "auth.token.secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }
        if self.token.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "auth.token.issuer cannot be empty".to_string(),
            ));
        }
        if self.token.ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "auth.token.ttl must be > 0".to_string(),
            ));
        }

        if self.verification.ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "auth.verification.ttl must be > 0".to_string(),
            ));
        }
        url::Url::parse(&self.verification.link_base_url).map_err(|e| {
            ConfigError::InvalidValue(format!("auth.verification.link_base_url: {e}"))
        })?;

        if let Some(oidc) = &self.oidc {
            oidc.validate()?;
        }

        if self.cookies.session_name.is_empty() || self.cookies.state_name.is_empty() {
            return Err(ConfigError::InvalidValue(
                "cookie names cannot be empty".to_string(),
            ));
        }
        if self.cookies.session_name == self.cookies.state_name {
            return Err(ConfigError::InvalidValue(
                "session and state cookies must have different names".to_string(),
            ));
        }
        if self.cookies.same_site == SameSitePolicy::None && !self.cookies.secure {
            return Err(ConfigError::InvalidValue(
                "same_site = none requires secure cookies".to_string(),
            ));
        }

        if self.identity.min_password_length == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.identity.min_password_length must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl OidcConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("auth.oidc.issuer", &self.issuer),
            ("auth.oidc.client_id", &self.client_id),
            ("auth.oidc.client_secret", &self.client_secret),
            ("auth.oidc.redirect_url", &self.redirect_url),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Missing(name.to_string()));
            }
        }

        let issuer = url::Url::parse(&self.issuer)
            .map_err(|e| ConfigError::InvalidValue(format!("auth.oidc.issuer: {e}")))?;
        if issuer.scheme() != "https" && !self.allow_http {
            return Err(ConfigError::InvalidValue(format!(
                "auth.oidc.issuer must use https (got '{}'); set allow_http for development",
                issuer.scheme()
            )));
        }
        url::Url::parse(&self.redirect_url)
            .map_err(|e| ConfigError::InvalidValue(format!("auth.oidc.redirect_url: {e}")))?;

        if !self.scopes.iter().any(|s| s == "openid") {
            return Err(ConfigError::InvalidValue(
                "auth.oidc.scopes must include 'openid'".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "auth.oidc.request_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
