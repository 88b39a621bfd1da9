//! Registration and email verification endpoints.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::error::AuthError;
use crate::middleware::AuthState;
use crate::orchestrator::RegisterRequest;

use super::SessionResponse;
use super::cookies::session_cookie;

#[derive(Debug, Deserialize)]
pub struct VerifyEmailParams {
    pub token: String,
}

/// `POST /auth/register`
pub async fn register_handler(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, AuthError> {
    let session = state.orchestrator.register(request).await?;
    let cookie = session_cookie(
        &state.cookies,
        session.token.as_str(),
        state.orchestrator.codec().ttl_seconds(),
    );
    Ok((
        StatusCode::CREATED,
        jar.add(cookie),
        Json(SessionResponse::from(session)),
    )
        .into_response())
}

/// `GET /auth/verify-email?token=..`
pub async fn verify_email_query_handler(
    State(state): State<AuthState>,
    Query(params): Query<VerifyEmailParams>,
) -> Result<Response, AuthError> {
    verify(&state, &params.token).await
}

/// `POST /auth/verify-email` with `{"token": ".."}`
pub async fn verify_email_handler(
    State(state): State<AuthState>,
    Json(params): Json<VerifyEmailParams>,
) -> Result<Response, AuthError> {
    verify(&state, &params.token).await
}

async fn verify(state: &AuthState, token: &str) -> Result<Response, AuthError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::invalid_input("token is required"));
    }
    let user = state.orchestrator.verify_email(token).await?;
    Ok(Json(json!({
        "message": "Email verified",
        "user": user.public(),
    }))
    .into_response())
}
