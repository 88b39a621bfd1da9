//! `email_verification_tokens` table.

use agrisafe_auth::{
    AuthError, AuthResult, EmailVerificationToken, User, VerificationTokenStorage,
};
use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::user::{USER_COLUMNS, UserTuple, insert_user, user_from_row};
use crate::{PostgresAuthStorage, StorageError, StorageResult};

type TokenTuple = (Uuid, Uuid, String, OffsetDateTime, OffsetDateTime, bool);

fn token_from_row(row: TokenTuple) -> EmailVerificationToken {
    let (id, user_id, token, created_at, expires_at, used) = row;
    EmailVerificationToken {
        id,
        user_id,
        token,
        created_at,
        expires_at,
        used,
    }
}

async fn insert_token(conn: &mut PgConnection, token: &EmailVerificationToken) -> StorageResult<()> {
    query(
        r#"
        INSERT INTO email_verification_tokens (id, user_id, token, created_at, expires_at, used)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(token.id)
    .bind(token.user_id)
    .bind(&token.token)
    .bind(token.created_at)
    .bind(token.expires_at)
    .bind(token.used)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Flips `used` on an unused token. When nothing was updated, a second
/// lookup tells an already used token apart from a missing one.
async fn consume_token(conn: &mut PgConnection, token_id: Uuid) -> AuthResult<()> {
    let result = query(
        "UPDATE email_verification_tokens SET used = TRUE WHERE id = $1 AND used = FALSE",
    )
    .bind(token_id)
    .execute(&mut *conn)
    .await
    .map_err(StorageError::from)?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let exists: bool =
        query_scalar("SELECT EXISTS (SELECT 1 FROM email_verification_tokens WHERE id = $1)")
            .bind(token_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(StorageError::from)?;

    Err(if exists {
        AuthError::TokenAlreadyUsed
    } else {
        AuthError::TokenNotFound
    })
}

// =============================================================================
// VerificationTokenStorage Implementation
// =============================================================================

#[async_trait]
impl VerificationTokenStorage for PostgresAuthStorage {
    async fn save(&self, token: &EmailVerificationToken) -> AuthResult<()> {
        let mut conn = self.pool().acquire().await.map_err(StorageError::from)?;
        insert_token(&mut *conn, token).await?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> AuthResult<Option<EmailVerificationToken>> {
        let row: Option<TokenTuple> = query_as(
            r#"
            SELECT id, user_id, token, created_at, expires_at, used
            FROM email_verification_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(row.map(token_from_row))
    }

    async fn mark_used(&self, token_id: Uuid) -> AuthResult<()> {
        let mut conn = self.pool().acquire().await.map_err(StorageError::from)?;
        consume_token(&mut *conn, token_id).await
    }

    async fn create_user_with_token(
        &self,
        user: &User,
        token: &EmailVerificationToken,
    ) -> AuthResult<User> {
        let mut tx = self.pool().begin().await.map_err(StorageError::from)?;

        let created = insert_user(&mut *tx, user).await?;
        insert_token(&mut *tx, token).await?;

        tx.commit().await.map_err(StorageError::from)?;
        tracing::debug!(user_id = %created.id, "Inserted user with verification token");
        Ok(created)
    }

    async fn confirm_email(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        verified_at: OffsetDateTime,
    ) -> AuthResult<User> {
        let mut tx = self.pool().begin().await.map_err(StorageError::from)?;

        consume_token(&mut *tx, token_id).await?;

        let sql = format!(
            r#"
            UPDATE users
            SET email_verified = TRUE, active = TRUE, updated_at = $2
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row: Option<UserTuple> = query_as(&sql)
            .bind(user_id)
            .bind(verified_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        let row = row.ok_or_else(|| StorageError::not_found(format!("user {user_id}")))?;
        let user = user_from_row(row)?;

        tx.commit().await.map_err(StorageError::from)?;
        Ok(user)
    }
}
