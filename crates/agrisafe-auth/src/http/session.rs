//! Session endpoints: logout, refresh and introspection.

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use serde_json::json;

use crate::error::AuthError;
use crate::middleware::{AuthState, SessionAuth, SessionTokenString, extract_session_token};
use crate::token::SessionClaims;

use super::cookies::{removal, session_cookie};

/// `POST /auth/logout`
///
/// Succeeds with or without a valid session; tokens are stateless so only
/// the cookie is removed.
pub async fn logout_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let claims = extract_session_token(&headers, &state.cookies)
        .and_then(|token| state.orchestrator.authenticate(&token).ok());
    state.orchestrator.logout(claims.as_ref());

    (
        jar.remove(removal(&state.cookies, &state.cookies.session_name)),
        Json(json!({ "message": "Logged out successfully" })),
    )
        .into_response()
}

/// `POST /auth/refresh`
pub async fn refresh_handler(
    State(state): State<AuthState>,
    jar: CookieJar,
    SessionTokenString(token): SessionTokenString,
) -> Result<Response, AuthError> {
    let renewed = state.orchestrator.refresh(&token)?;
    let cookie = session_cookie(
        &state.cookies,
        renewed.as_str(),
        state.orchestrator.codec().ttl_seconds(),
    );
    Ok((jar.add(cookie), Json(json!({ "token": renewed.as_str() }))).into_response())
}

/// `GET /auth/me`
pub async fn me_handler(SessionAuth(claims): SessionAuth) -> Json<SessionClaims> {
    Json(claims)
}
