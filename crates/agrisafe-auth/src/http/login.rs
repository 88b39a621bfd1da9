//! Federated login endpoints.
//!
//! `GET /auth/login` redirects to the provider and stores the CSRF state in a
//! cookie. `GET /auth/callback` checks it, signs the user in and always
//! removes the state cookie.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::federation::{CallbackParams, CsrfState};
use crate::middleware::AuthState;

use super::SessionResponse;
use super::cookies::{removal, session_cookie, state_cookie};

/// `GET /auth/login`
pub async fn login_handler(State(state): State<AuthState>, jar: CookieJar) -> Response {
    match state.orchestrator.begin_login() {
        Ok(redirect) => {
            let cookie = state_cookie(
                &state.cookies,
                redirect.state.as_str(),
                state.state_cookie_max_age,
            );
            (
                StatusCode::FOUND,
                jar.add(cookie),
                [(LOCATION, redirect.authorization_url.to_string())],
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// `GET /auth/callback?state=..&code=..`
pub async fn callback_handler(
    State(state): State<AuthState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    let stored = jar
        .get(&state.cookies.state_name)
        .map(|c| CsrfState::from_stored(c.value()));
    let jar = jar.remove(removal(&state.cookies, &state.cookies.state_name));

    match state.orchestrator.complete_login(stored, &params).await {
        Ok(session) => {
            let cookie = session_cookie(
                &state.cookies,
                session.token.as_str(),
                state.orchestrator.codec().ttl_seconds(),
            );
            (jar.add(cookie), Json(SessionResponse::from(session))).into_response()
        }
        Err(e) => (jar, e).into_response(),
    }
}
