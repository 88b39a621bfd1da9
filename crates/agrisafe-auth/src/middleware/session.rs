//! Session token extraction.
//!
//! The session token is read from `Authorization: Bearer <token>` first and
//! from the session cookie second.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;

use crate::config::{AuthConfig, CookieConfig};
use crate::error::AuthError;
use crate::orchestrator::AuthOrchestrator;
use crate::token::SessionClaims;

const DEFAULT_STATE_COOKIE_MAX_AGE: Duration = Duration::from_secs(600);

// =============================================================================
// Auth State
// =============================================================================

/// State shared by the auth handlers and extractors.
///
/// Include it in the application state and expose it through `FromRef`.
#[derive(Clone)]
pub struct AuthState {
    pub orchestrator: Arc<AuthOrchestrator>,
    pub cookies: CookieConfig,
    /// Lifetime of the CSRF state cookie set by the login redirect.
    pub state_cookie_max_age: Duration,
}

impl AuthState {
    #[must_use]
    pub fn new(orchestrator: Arc<AuthOrchestrator>, config: &AuthConfig) -> Self {
        Self {
            orchestrator,
            cookies: config.cookies.clone(),
            state_cookie_max_age: config
                .oidc
                .as_ref()
                .map_or(DEFAULT_STATE_COOKIE_MAX_AGE, |oidc| oidc.state_cookie_max_age),
        }
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// The caller's raw session token, not yet verified.
pub struct SessionTokenString(pub String);

impl<S> FromRequestParts<S> for SessionTokenString
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        extract_session_token(&parts.headers, &auth_state.cookies)
            .map(SessionTokenString)
            .ok_or_else(|| AuthError::unauthenticated("Missing session token"))
    }
}

/// Verified session claims of the caller.
///
/// # Errors
///
/// Rejects with `Unauthenticated` when no token is present, or with the
/// decoding error (`InvalidSignature`, `MalformedToken`, `Expired`).
pub struct SessionAuth(pub SessionClaims);

impl<S> FromRequestParts<S> for SessionAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let SessionTokenString(token) =
            SessionTokenString::from_request_parts(parts, state).await?;

        let claims = auth_state.orchestrator.authenticate(&token)?;
        Ok(SessionAuth(claims))
    }
}

/// Reads the session token from the bearer header, then the session cookie.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap, cookies: &CookieConfig) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(&cookies.session_name)
        .map(|c| c.value().trim().to_string())
        .filter(|t| !t.is_empty())
}
