//! Local user resolution for federated and local sign-ups.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::IdentityConfig;
use crate::password;
use crate::storage::{User, UserStorage};
use crate::{AuthError, AuthResult};

/// Lower-cases and trims an email address. All lookups use this form.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Finds or creates local user records.
#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserStorage>,
    clock: Arc<dyn Clock>,
    config: IdentityConfig,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(users: Arc<dyn UserStorage>, clock: Arc<dyn Clock>, config: IdentityConfig) -> Self {
        Self {
            users,
            clock,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Returns the user with `email`, creating an OIDC-only account if none
    /// exists.
    ///
    /// New accounts are active, have no password and the default role. They
    /// start verified only if `provider_email_verified` is set and the
    /// provider is trusted for email verification. An existing unverified user
    /// is upgraded under the same rule.
    ///
    /// When two logins race to create the same email, the loser re-reads and
    /// returns the winner's record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Persistence` on storage failure.
    pub async fn resolve_or_create(
        &self,
        email: &str,
        display_name: &str,
        provider_email_verified: bool,
    ) -> AuthResult<User> {
        let email = normalize_email(email);
        let verified = self.config.trust_provider_email_verification && provider_email_verified;

        if let Some(mut user) = self.users.find_by_email(&email).await? {
            if verified && !user.email_verified {
                user.email_verified = true;
                user.updated_at = self.clock.now();
                self.users.update(&user).await?;
                tracing::info!(user_id = %user.id, "Email verified by trusted provider");
            }
            return Ok(user);
        }

        let candidate = User::new_federated(display_name, email.as_str(), verified, self.clock.now());
        match self.users.create(&candidate).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, email = %user.email, "Created user from OIDC login");
                Ok(user)
            }
            Err(AuthError::EmailAlreadyRegistered) => {
                tracing::warn!(email = %email, "Concurrent OIDC sign-up, using existing user");
                self.users.find_by_email(&email).await?.ok_or_else(|| {
                    AuthError::persistence("user vanished after unique violation")
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Builds, without persisting, an inactive and unverified local account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailAlreadyRegistered` if the email is taken.
    pub async fn prepare_local(&self, name: &str, email: &str, password: &str) -> AuthResult<User> {
        let email = normalize_email(email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyRegistered);
        }

        let hash = password::hash_password_blocking(password.to_string()).await?;
        Ok(User::new_local(name.trim(), email, hash, self.clock.now()))
    }

    /// Registers a local account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailAlreadyRegistered` if the email is taken,
    /// including when a concurrent registration wins the race.
    pub async fn register_local(&self, name: &str, email: &str, password: &str) -> AuthResult<User> {
        let user = self.prepare_local(name, email, password).await?;
        let user = self.users.create(&user).await?;
        tracing::info!(user_id = %user.id, "Registered local user");
        Ok(user)
    }
}
