//! HTTP surface of the auth flows.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /auth/login` | [`login_handler`] |
//! | `GET /auth/callback` | [`callback_handler`] |
//! | `POST /auth/register` | [`register_handler`] |
//! | `POST /auth/logout` | [`logout_handler`] |
//! | `GET`/`POST /auth/verify-email` | [`verify_email_query_handler`], [`verify_email_handler`] |
//! | `POST /auth/refresh` | [`refresh_handler`] |
//! | `GET /auth/me` | [`me_handler`] |

pub mod account;
pub(crate) mod cookies;
pub mod login;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::middleware::AuthState;
use crate::orchestrator::AuthSession;
use crate::storage::PublicUser;

pub use account::{register_handler, verify_email_handler, verify_email_query_handler};
pub use login::{callback_handler, login_handler};
pub use session::{logout_handler, me_handler, refresh_handler};

/// Body returned when a session is issued.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: PublicUser,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: session.user.public(),
            token: session.token.into_string(),
        }
    }
}

/// Builds the `/auth` routes.
pub fn auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/auth/login", get(login_handler))
        .route("/auth/callback", get(callback_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/logout", post(logout_handler))
        .route(
            "/auth/verify-email",
            get(verify_email_query_handler).post(verify_email_handler),
        )
        .route("/auth/refresh", post(refresh_handler))
        .route("/auth/me", get(me_handler))
        .with_state(state)
}
