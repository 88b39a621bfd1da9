//! Email verification token storage trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::User;
use crate::AuthResult;

/// A single-use, time-bounded email verification token.
///
/// Rows are never deleted. `used` only ever moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailVerificationToken {
    pub id: Uuid,

    /// Owning user.
    pub user_id: Uuid,

    /// Opaque token string mailed to the user.
    #[serde(skip_serializing)]
    pub token: String,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    pub used: bool,
}

/// Storage for email verification tokens.
///
/// The two compound operations must be atomic in the backend: either every
/// effect is committed or none is.
#[async_trait]
pub trait VerificationTokenStorage: Send + Sync {
    /// Persist a new token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Persistence` if the storage operation fails.
    async fn save(&self, token: &EmailVerificationToken) -> AuthResult<()>;

    /// Find a token by its opaque string.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Persistence` if the storage operation fails.
    async fn find_by_token(&self, token: &str) -> AuthResult<Option<EmailVerificationToken>>;

    /// Set `used = true` on an unused token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenAlreadyUsed` if the token exists but was
    /// already consumed, `AuthError::TokenNotFound` if no token has that id.
    async fn mark_used(&self, token_id: Uuid) -> AuthResult<()>;

    /// Insert a user together with their first verification token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailAlreadyRegistered` if the email is taken. No
    /// row is written on any failure.
    async fn create_user_with_token(
        &self,
        user: &User,
        token: &EmailVerificationToken,
    ) -> AuthResult<User>;

    /// Consume the token and mark its owner verified and active.
    ///
    /// Returns the updated user, stamped with `verified_at`.
    ///
    /// # Errors
    ///
    /// Same as [`mark_used`](Self::mark_used). Neither effect is committed on
    /// failure.
    async fn confirm_email(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        verified_at: OffsetDateTime,
    ) -> AuthResult<User>;
}
