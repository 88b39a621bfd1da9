//! # agrisafe-auth
//!
//! Identity and session token lifecycle for the AgriSafe API.
//!
//! This crate provides:
//! - Stateless HS256 session tokens with a refresh window
//! - Local registration with Argon2id password hashes and email verification
//! - Federated login against an external OpenID Connect provider
//! - Axum handlers and extractors for the `/auth` routes
//!
//! ## Modules
//!
//! - [`token`] - Session token issue, decode and refresh
//! - [`verification`] - Email verification tokens
//! - [`federation`] - OIDC discovery, provider keys and the login round trip
//! - [`identity`] - Local user resolution and registration
//! - [`orchestrator`] - Request-level flows composed from the above
//! - [`storage`] - Persistence traits and the in-memory backend
//! - [`middleware`] - Session extractors and error responses
//! - [`http`] - Axum handlers

pub mod clock;
pub mod config;
pub mod error;
pub mod federation;
pub mod http;
pub mod identity;
pub mod mailer;
pub mod middleware;
pub mod orchestrator;
pub mod password;
pub mod random;
pub mod storage;
pub mod token;
pub mod verification;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use federation::{ExternalProfile, FederationError, OidcFederator};
pub use http::auth_router;
pub use identity::IdentityResolver;
pub use mailer::{LogMailer, MailError, VerificationMailer};
pub use middleware::{AuthState, SessionAuth};
pub use orchestrator::{AuthOrchestrator, AuthSession, RegisterRequest};
pub use random::{FixedRandom, OsRandom, SecureRandom};
pub use storage::{
    EmailVerificationToken, MemoryAuthStorage, PublicUser, Role, User, UserStorage,
    VerificationTokenStorage,
};
pub use token::{SessionClaims, SessionToken, TokenCodec};
pub use verification::VerificationTokenStore;

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use agrisafe_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::middleware::{AuthState, SessionAuth};
    pub use crate::orchestrator::{AuthOrchestrator, AuthSession, RegisterRequest};
    pub use crate::random::{OsRandom, SecureRandom};
    pub use crate::storage::{User, UserStorage, VerificationTokenStorage};
    pub use crate::token::{SessionClaims, TokenCodec};
}
