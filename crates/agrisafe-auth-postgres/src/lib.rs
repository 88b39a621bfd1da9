//! PostgreSQL storage backend for AgriSafe auth.
//!
//! Implements the user and verification-token persistence traits of
//! `agrisafe-auth` on two plain tables, `users` and
//! `email_verification_tokens`. The schema is embedded and applied with
//! [`PostgresAuthStorage::migrate`].
//!
//! # Example
//!
//! ```ignore
//! use agrisafe_auth_postgres::PostgresAuthStorage;
//!
//! let storage = PostgresAuthStorage::connect("postgres://localhost/agrisafe").await?;
//! storage.migrate().await?;
//! ```

pub mod migrations;
pub mod user;
pub mod verification;

use std::sync::Arc;
use std::time::Duration;

use agrisafe_auth::AuthError;
use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during auth storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value could not be decoded.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Applying the embedded schema failed.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StorageError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Maps a unique violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_insert(err: sqlx_core::Error, what: &str) -> Self {
        if let sqlx_core::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(_) => AuthError::EmailAlreadyRegistered,
            other => {
                tracing::error!(error = %other, "Auth storage operation failed");
                AuthError::persistence(other.to_string())
            }
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// PostgreSQL Auth Storage
// =============================================================================

/// PostgreSQL storage backend for users and verification tokens.
///
/// Implements both [`agrisafe_auth::UserStorage`] and
/// [`agrisafe_auth::VerificationTokenStorage`] over one pool, so the compound
/// operations can share a transaction.
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with(database_url, 10, Duration::from_secs(5)).await
    }

    /// Connects with an explicit pool size and acquire timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect_with(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StorageResult<Self> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Applies the embedded schema.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Migration` if a migration fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_predicates() {
        let err = StorageError::not_found("token 1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: token 1");

        let err = StorageError::conflict("user already exists");
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_conversion_to_auth_error() {
        let err: AuthError = StorageError::conflict("user already exists").into();
        assert!(matches!(err, AuthError::EmailAlreadyRegistered));

        let err: AuthError = StorageError::InvalidData("role 'root'".into()).into();
        assert!(matches!(err, AuthError::Persistence { .. }));

        let err: AuthError = StorageError::Database(sqlx_core::Error::RowNotFound).into();
        assert!(matches!(err, AuthError::Persistence { .. }));
    }
}
