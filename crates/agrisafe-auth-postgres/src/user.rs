//! `users` table.

use std::str::FromStr;

use agrisafe_auth::{AuthError, AuthResult, Role, User, UserStorage};
use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PostgresAuthStorage, StorageError, StorageResult};

// =============================================================================
// Row Mapping
// =============================================================================

/// `(id, name, email, password_hash, role, active, email_verified, created_at, updated_at)`
pub(crate) type UserTuple = (
    Uuid,
    String,
    String,
    Option<String>,
    String,
    bool,
    bool,
    OffsetDateTime,
    OffsetDateTime,
);

pub(crate) const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, active, email_verified, created_at, updated_at";

pub(crate) fn user_from_row(row: UserTuple) -> StorageResult<User> {
    let (id, name, email, password_hash, role, active, email_verified, created_at, updated_at) =
        row;
    let role = Role::from_str(&role).map_err(StorageError::InvalidData)?;
    Ok(User {
        id,
        name,
        email,
        password_hash,
        role,
        active,
        email_verified,
        created_at,
        updated_at,
    })
}

/// Inserts a user on the given connection.
pub(crate) async fn insert_user(conn: &mut PgConnection, user: &User) -> StorageResult<User> {
    let sql = format!(
        r#"
        INSERT INTO users ({USER_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {USER_COLUMNS}
        "#
    );
    let row: UserTuple = query_as(&sql)
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.email_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| StorageError::from_insert(e, &format!("user with email '{}'", user.email)))?;

    user_from_row(row)
}

// =============================================================================
// UserStorage Implementation
// =============================================================================

#[async_trait]
impl UserStorage for PostgresAuthStorage {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row: Option<UserTuple> = query_as(&sql)
            .bind(email)
            .fetch_optional(self.pool())
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(user_from_row).transpose()?)
    }

    async fn create(&self, user: &User) -> AuthResult<User> {
        let mut conn = self.pool().acquire().await.map_err(StorageError::from)?;
        let created = insert_user(&mut *conn, user).await?;
        tracing::debug!(user_id = %created.id, "Inserted user");
        Ok(created)
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        let result = query(
            r#"
            UPDATE users
            SET name = $2, email = $3, password_hash = $4, role = $5,
                active = $6, email_verified = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.email_verified)
        .bind(user.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::from_insert(e, &format!("user with email '{}'", user.email)))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::persistence(format!("user {} does not exist", user.id)));
        }
        Ok(())
    }
}
