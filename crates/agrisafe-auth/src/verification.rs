//! Email verification token lifecycle.
//!
//! [`VerificationTokenStore`] mints opaque single-use tokens and wraps the
//! persistence collaborator so that lookups and consumption surface typed
//! errors.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::clock::Clock;
use crate::random::SecureRandom;
use crate::storage::{User, VerificationTokenStorage};
use crate::{AuthError, AuthResult};

pub use crate::storage::EmailVerificationToken;

/// Front for the verification token persistence collaborator.
#[derive(Clone)]
pub struct VerificationTokenStore {
    storage: Arc<dyn VerificationTokenStorage>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn SecureRandom>,
    ttl: time::Duration,
}

impl VerificationTokenStore {
    /// Creates a store whose tokens live for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if `ttl` does not fit a signed
    /// duration.
    pub fn new(
        storage: Arc<dyn VerificationTokenStorage>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn SecureRandom>,
        ttl: Duration,
    ) -> AuthResult<Self> {
        let ttl = time::Duration::try_from(ttl)
            .map_err(|e| AuthError::configuration(format!("verification ttl: {e}")))?;
        Ok(Self {
            storage,
            clock,
            random,
            ttl,
        })
    }

    /// Builds an unsaved token for `user`. The token string is 256 random
    /// bits, hex encoded.
    #[must_use]
    pub fn generate(&self, user: &User) -> EmailVerificationToken {
        let now = self.clock.now();
        EmailVerificationToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            token: self.random.opaque_hex(),
            created_at: now,
            expires_at: now + self.ttl,
            used: false,
        }
    }

    /// Persists a new token. The token is always stored unused.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Persistence` on storage failure.
    pub async fn save(&self, token: &EmailVerificationToken) -> AuthResult<()> {
        if token.used {
            let fresh = EmailVerificationToken {
                used: false,
                ..token.clone()
            };
            return self.storage.save(&fresh).await;
        }
        self.storage.save(token).await
    }

    /// Looks a token up by its opaque string.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenNotFound` if no token matches.
    pub async fn find_by_token(&self, token: &str) -> AuthResult<EmailVerificationToken> {
        self.storage
            .find_by_token(token)
            .await?
            .ok_or(AuthError::TokenNotFound)
    }

    /// Consumes a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenAlreadyUsed` on a second call for the same
    /// token, `AuthError::TokenNotFound` for an unknown id.
    pub async fn mark_used(&self, token_id: Uuid) -> AuthResult<()> {
        self.storage.mark_used(token_id).await
    }

    /// `now > expires_at` in whole seconds, regardless of the `used` flag.
    #[must_use]
    pub fn is_expired(&self, token: &EmailVerificationToken) -> bool {
        self.clock.unix_now() > token.expires_at.unix_timestamp()
    }

    /// Consumes `token` and marks its owner verified and active in one commit.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenAlreadyUsed` if the token was consumed
    /// concurrently, `AuthError::TokenNotFound` if it vanished.
    pub async fn confirm(&self, token: &EmailVerificationToken) -> AuthResult<User> {
        self.storage
            .confirm_email(token.id, token.user_id, self.clock.now())
            .await
    }

    /// Returns the underlying persistence collaborator.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn VerificationTokenStorage> {
        &self.storage
    }
}
