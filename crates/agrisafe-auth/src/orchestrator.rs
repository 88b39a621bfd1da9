//! Request-level authentication flows.
//!
//! [`AuthOrchestrator`] composes the token codec, the identity resolver, the
//! verification token store and the optional OIDC federator into the flows
//! exposed over HTTP: registration, federated login, logout, email
//! verification and session refresh.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::federation::{CallbackParams, CsrfState, LoginRedirect, OidcFederator};
use crate::identity::IdentityResolver;
use crate::mailer::{LogMailer, VerificationMailer, verification_link};
use crate::random::SecureRandom;
use crate::storage::{User, UserStorage, VerificationTokenStorage};
use crate::token::{SessionClaims, SessionToken, TokenCodec};
use crate::verification::VerificationTokenStore;
use crate::{AuthError, AuthResult};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex")
});

const MAX_NAME_LENGTH: usize = 100;
const MAX_PASSWORD_LENGTH: usize = 256;

/// Registration input.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// A signed-in user and the session token issued for them.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: SessionToken,
    pub user: User,
}

/// Composes the identity components into request-level flows.
#[derive(Clone)]
pub struct AuthOrchestrator {
    codec: TokenCodec,
    identity: IdentityResolver,
    verification: VerificationTokenStore,
    federator: Option<Arc<OidcFederator>>,
    mailer: Arc<dyn VerificationMailer>,
    link_base_url: String,
    min_password_length: usize,
}

impl AuthOrchestrator {
    /// Builds the orchestrator without a federator and with [`LogMailer`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the token or verification
    /// settings are unusable.
    pub fn from_config(
        config: &AuthConfig,
        users: Arc<dyn UserStorage>,
        tokens: Arc<dyn VerificationTokenStorage>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn SecureRandom>,
    ) -> AuthResult<Self> {
        let codec = TokenCodec::from_config(&config.token, clock.clone())?;
        let identity = IdentityResolver::new(users, clock.clone(), config.identity.clone());
        let verification =
            VerificationTokenStore::new(tokens, clock, random, config.verification.ttl)?;

        Ok(Self {
            codec,
            identity,
            verification,
            federator: None,
            mailer: Arc::new(LogMailer),
            link_base_url: config.verification.link_base_url.clone(),
            min_password_length: config.identity.min_password_length,
        })
    }

    /// Enables federated login.
    #[must_use]
    pub fn with_federator(mut self, federator: Arc<OidcFederator>) -> Self {
        self.federator = Some(federator);
        self
    }

    /// Replaces the verification mailer.
    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn VerificationMailer>) -> Self {
        self.mailer = mailer;
        self
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn is_oidc_configured(&self) -> bool {
        self.federator.is_some()
    }

    fn federator(&self) -> AuthResult<&OidcFederator> {
        self.federator.as_deref().ok_or(AuthError::OidcNotConfigured)
    }

    // -------------------------------------------------------------------------
    // Register
    // -------------------------------------------------------------------------

    /// Registers a local account and signs it in.
    ///
    /// The user row and its verification token are written in one atomic
    /// step. The verification mail is sent afterwards; a delivery failure is
    /// logged and does not fail the registration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for bad input, `EmailAlreadyRegistered` if the
    /// email is taken, or `Persistence`.
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<AuthSession> {
        validate_registration(&request, self.min_password_length)?;

        let user = self
            .identity
            .prepare_local(&request.name, &request.email, &request.password)
            .await?;
        let token = self.codec.issue(&user)?;
        let verification = self.verification.generate(&user);

        let user = self
            .verification
            .storage()
            .create_user_with_token(&user, &verification)
            .await?;
        tracing::info!(user_id = %user.id, "User registered");

        self.send_verification_mail(&user, &verification.token).await;

        Ok(AuthSession { token, user })
    }

    async fn send_verification_mail(&self, user: &User, token: &str) {
        let link = match verification_link(&self.link_base_url, token) {
            Ok(link) => link,
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Invalid verification link base URL");
                return;
            }
        };
        if let Err(e) = self.mailer.send_verification(user, &link).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to send verification mail");
        }
    }

    // -------------------------------------------------------------------------
    // OIDC login
    // -------------------------------------------------------------------------

    /// Starts a federated login.
    ///
    /// # Errors
    ///
    /// Returns `OidcNotConfigured` if no provider is configured.
    pub fn begin_login(&self) -> AuthResult<LoginRedirect> {
        Ok(self.federator()?.begin_login())
    }

    /// Finishes a federated login and signs the user in.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error: `OidcNotConfigured`,
    /// `CsrfStateMismatch`, `InvalidInput`, `CodeExchangeFailed`, `MissingIdToken`,
    /// `IdTokenVerificationFailed`, `MalformedProfileClaims` or `Persistence`.
    pub async fn complete_login(
        &self,
        stored_state: Option<CsrfState>,
        params: &CallbackParams,
    ) -> AuthResult<AuthSession> {
        let profile = self
            .federator()?
            .complete_login(stored_state, params)
            .await?;

        let user = self
            .identity
            .resolve_or_create(&profile.email, &profile.name, profile.email_verified)
            .await?;
        let token = self.codec.issue(&user)?;

        tracing::info!(user_id = %user.id, "User logged in via OIDC");
        Ok(AuthSession { token, user })
    }

    // -------------------------------------------------------------------------
    // Logout
    // -------------------------------------------------------------------------

    /// Logs a logout. Tokens are stateless, so the only effect is the client
    /// discarding its cookie.
    pub fn logout(&self, claims: Option<&SessionClaims>) {
        match claims {
            Some(claims) => tracing::info!(user_id = %claims.user_id, "User logged out"),
            None => tracing::info!("Anonymous logout"),
        }
    }

    // -------------------------------------------------------------------------
    // VerifyEmail
    // -------------------------------------------------------------------------

    /// Consumes a verification token and marks its owner verified and active.
    ///
    /// # Errors
    ///
    /// Returns `TokenNotFound`, `TokenAlreadyUsed` or `TokenExpired`. The user
    /// update and the token consumption are committed together or not at all.
    pub async fn verify_email(&self, token: &str) -> AuthResult<User> {
        let record = self.verification.find_by_token(token).await?;
        if record.used {
            return Err(AuthError::TokenAlreadyUsed);
        }
        if self.verification.is_expired(&record) {
            return Err(AuthError::TokenExpired);
        }

        let user = self.verification.confirm(&record).await?;
        tracing::info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Decodes a session token.
    ///
    /// # Errors
    ///
    /// See [`TokenCodec::decode`].
    pub fn authenticate(&self, token: &str) -> AuthResult<SessionClaims> {
        self.codec.decode(token).inspect_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
        })
    }

    /// Renews a session token inside its refresh window.
    ///
    /// # Errors
    ///
    /// See [`TokenCodec::refresh`].
    pub fn refresh(&self, token: &str) -> AuthResult<SessionToken> {
        self.codec.refresh(token).inspect_err(|e| {
            tracing::debug!(error = %e, "Refresh rejected");
        })
    }
}

/// Checks registration input shape.
///
/// # Errors
///
/// Returns `AuthError::InvalidInput` naming the first bad field.
pub fn validate_registration(request: &RegisterRequest, min_password_length: usize) -> AuthResult<()> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AuthError::invalid_input("name is required"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::invalid_input(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    if !EMAIL_RE.is_match(request.email.trim()) {
        return Err(AuthError::invalid_input("email is not a valid address"));
    }
    let password_length = request.password.chars().count();
    if password_length < min_password_length {
        return Err(AuthError::invalid_input(format!(
            "password must be at least {min_password_length} characters"
        )));
    }
    if password_length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::invalid_input(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
