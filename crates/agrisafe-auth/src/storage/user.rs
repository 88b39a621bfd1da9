//! User storage trait.
//!
//! Defines the user record this crate reads and writes, and the persistence
//! interface for it. Implementations are provided by storage backends (e.g.,
//! PostgreSQL, or [`MemoryAuthStorage`](super::MemoryAuthStorage) for tests).

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;

// =============================================================================
// Role
// =============================================================================

/// Role of a user within the disaster-management API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    #[default]
    Member,
}

impl Role {
    /// Returns the lowercase wire and column representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            "member" => Ok(Self::Member),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

// =============================================================================
// User Type
// =============================================================================

/// A user account.
///
/// Local accounts carry a password hash; accounts created through federated
/// login have none and can only sign in through the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Email address, unique across all users.
    pub email: String,

    /// Argon2 PHC string. `None` for OIDC-only accounts.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    pub role: Role,

    /// Whether the account may be used.
    pub active: bool,

    /// Whether the email address has been confirmed.
    pub email_verified: bool,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Creates an inactive, unverified local account.
    #[must_use]
    pub fn new_local(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: String,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: Some(password_hash),
            role: Role::default(),
            active: false,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an active account without a local credential.
    #[must_use]
    pub fn new_federated(
        name: impl Into<String>,
        email: impl Into<String>,
        email_verified: bool,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: None,
            role: Role::default(),
            active: true,
            email_verified,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if the account can sign in with a password.
    #[must_use]
    pub fn has_local_credential(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Returns the fields that are safe to hand back to clients.
    #[must_use]
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Minimal public view of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

// =============================================================================
// User Storage Trait
// =============================================================================

/// Storage for user accounts.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Find a user by their email address.
    ///
    /// Returns `None` if no user has that email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Persistence` if the storage operation fails.
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailAlreadyRegistered` if the email is taken, or
    /// `AuthError::Persistence` if the storage operation fails.
    async fn create(&self, user: &User) -> AuthResult<User>;

    /// Replace the stored record with the given user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Persistence` if the user does not exist or the
    /// storage operation fails.
    async fn update(&self, user: &User) -> AuthResult<()>;
}
