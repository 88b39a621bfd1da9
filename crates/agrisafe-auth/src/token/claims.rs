//! Session token claims.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::{Role, User};

/// Identity claims carried by a session token.
///
/// Built from a [`User`] at issuance and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user id.
    pub user_id: String,

    pub email: String,

    pub role: Role,

    /// Whether the user's email was confirmed at issuance time.
    pub email_verified: bool,

    /// Issuer.
    pub iss: String,

    /// Issued-at (Unix seconds).
    pub iat: i64,

    /// Expiry (Unix seconds). Always greater than `iat`.
    pub exp: i64,
}

impl SessionClaims {
    pub(crate) fn for_user(user: &User, issuer: &str, iat: i64, exp: i64) -> Self {
        Self {
            user_id: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            email_verified: user.email_verified,
            iss: issuer.to_string(),
            iat,
            exp,
        }
    }

    /// Returns the number of seconds until expiry, negative once expired.
    #[must_use]
    pub fn remaining_seconds(&self, now: i64) -> i64 {
        self.exp - now
    }

    /// A token is valid only while `now < exp`.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}

/// An encoded, signed session token.
///
/// `Debug` output is redacted so tokens never reach logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub(crate) fn new(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
