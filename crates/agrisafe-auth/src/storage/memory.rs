//! In-memory storage backend.
//!
//! Used by tests and by local development setups without a database. A single
//! lock guards users and tokens together so the compound operations commit
//! atomically, which mirrors the transactions of the PostgreSQL backend.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{EmailVerificationToken, User, UserStorage, VerificationTokenStorage};
use crate::{AuthError, AuthResult};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    tokens: HashMap<Uuid, EmailVerificationToken>,
}

impl State {
    fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }

    fn insert_user(&mut self, user: &User) -> AuthResult<User> {
        if self.email_taken(&user.email) {
            return Err(AuthError::EmailAlreadyRegistered);
        }
        if self.users.contains_key(&user.id) {
            return Err(AuthError::persistence(format!(
                "duplicate user id {}",
                user.id
            )));
        }
        self.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    fn check_token_insert(&self, token: &EmailVerificationToken) -> AuthResult<()> {
        if self.tokens.contains_key(&token.id) || self.tokens.values().any(|t| t.token == token.token)
        {
            return Err(AuthError::persistence("duplicate verification token"));
        }
        Ok(())
    }

    fn check_unused(&self, token_id: Uuid) -> AuthResult<()> {
        match self.tokens.get(&token_id) {
            None => Err(AuthError::TokenNotFound),
            Some(t) if t.used => Err(AuthError::TokenAlreadyUsed),
            Some(_) => Ok(()),
        }
    }
}

/// In-memory implementation of [`UserStorage`] and [`VerificationTokenStorage`].
#[derive(Debug, Default)]
pub struct MemoryAuthStorage {
    state: Mutex<State>,
}

impl MemoryAuthStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored users.
    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    /// Returns all tokens issued to a user.
    pub async fn tokens_for_user(&self, user_id: Uuid) -> Vec<EmailVerificationToken> {
        self.state
            .lock()
            .await
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserStorage for MemoryAuthStorage {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: &User) -> AuthResult<User> {
        self.state.lock().await.insert_user(user)
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        let Some(existing) = state.users.get(&user.id) else {
            return Err(AuthError::persistence(format!("user {} not found", user.id)));
        };
        if existing.email != user.email && state.email_taken(&user.email) {
            return Err(AuthError::EmailAlreadyRegistered);
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl VerificationTokenStorage for MemoryAuthStorage {
    async fn save(&self, token: &EmailVerificationToken) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        state.check_token_insert(token)?;
        if !state.users.contains_key(&token.user_id) {
            return Err(AuthError::persistence(format!(
                "user {} not found",
                token.user_id
            )));
        }
        state.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> AuthResult<Option<EmailVerificationToken>> {
        let state = self.state.lock().await;
        Ok(state.tokens.values().find(|t| t.token == token).cloned())
    }

    async fn mark_used(&self, token_id: Uuid) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        state.check_unused(token_id)?;
        if let Some(t) = state.tokens.get_mut(&token_id) {
            t.used = true;
        }
        Ok(())
    }

    async fn create_user_with_token(
        &self,
        user: &User,
        token: &EmailVerificationToken,
    ) -> AuthResult<User> {
        let mut state = self.state.lock().await;
        state.check_token_insert(token)?;
        let created = state.insert_user(user)?;
        state.tokens.insert(token.id, token.clone());
        Ok(created)
    }

    async fn confirm_email(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        verified_at: OffsetDateTime,
    ) -> AuthResult<User> {
        let mut state = self.state.lock().await;
        state.check_unused(token_id)?;
        if !state.users.contains_key(&user_id) {
            return Err(AuthError::persistence(format!("user {user_id} not found")));
        }

        if let Some(t) = state.tokens.get_mut(&token_id) {
            t.used = true;
        }
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AuthError::persistence(format!("user {user_id} not found")))?;
        user.email_verified = true;
        user.active = true;
        user.updated_at = verified_at;
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn user(email: &str) -> User {
        User::new_local("Test", email, "hash".into(), OffsetDateTime::now_utc())
    }

    fn token_for(user: &User, value: &str) -> EmailVerificationToken {
        let now = OffsetDateTime::now_utc();
        EmailVerificationToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            token: value.to_string(),
            created_at: now,
            expires_at: now + Duration::hours(24),
            used: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let storage = MemoryAuthStorage::new();
        let u = user("a@example.com");
        storage.create(&u).await.unwrap();

        let found = storage.find_by_email("a@example.com").await.unwrap();
        assert_eq!(found, Some(u));
        assert!(storage.find_by_email("b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let storage = MemoryAuthStorage::new();
        storage.create(&user("a@example.com")).await.unwrap();
        let err = storage.create(&user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyRegistered));
        assert_eq!(storage.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_user() {
        let storage = MemoryAuthStorage::new();
        let mut u = user("a@example.com");
        storage.create(&u).await.unwrap();

        u.name = "Renamed".into();
        storage.update(&u).await.unwrap();
        let found = storage.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(found.name, "Renamed");

        let missing = user("z@example.com");
        assert!(storage.update(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_mark_used_distinguishes_used_from_absent() {
        let storage = MemoryAuthStorage::new();
        let u = user("a@example.com");
        let t = token_for(&u, "abc");
        storage.create_user_with_token(&u, &t).await.unwrap();

        storage.mark_used(t.id).await.unwrap();
        let err = storage.mark_used(t.id).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenAlreadyUsed));

        let err = storage.mark_used(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));
    }

    #[tokio::test]
    async fn test_create_user_with_token_is_atomic() {
        let storage = MemoryAuthStorage::new();
        let first = user("a@example.com");
        storage
            .create_user_with_token(&first, &token_for(&first, "dup"))
            .await
            .unwrap();

        // Token collision: the second user must not be written.
        let second = user("b@example.com");
        let result = storage
            .create_user_with_token(&second, &token_for(&second, "dup"))
            .await;
        assert!(result.is_err());
        assert!(storage.find_by_email("b@example.com").await.unwrap().is_none());

        // Email collision: the token must not be written.
        let third = user("a@example.com");
        let err = storage
            .create_user_with_token(&third, &token_for(&third, "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyRegistered));
        assert!(storage.find_by_token("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_confirm_email_updates_both() {
        let storage = MemoryAuthStorage::new();
        let u = user("a@example.com");
        let t = token_for(&u, "abc");
        storage.create_user_with_token(&u, &t).await.unwrap();

        let verified_at = OffsetDateTime::from_unix_timestamp(1_800_000_000).unwrap();
        let confirmed = storage.confirm_email(t.id, u.id, verified_at).await.unwrap();
        assert!(confirmed.email_verified);
        assert!(confirmed.active);
        assert_eq!(confirmed.updated_at, verified_at);
        assert!(storage.find_by_token("abc").await.unwrap().unwrap().used);

        let err = storage.confirm_email(t.id, u.id, verified_at).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenAlreadyUsed));
    }

    #[tokio::test]
    async fn test_save_requires_owner() {
        let storage = MemoryAuthStorage::new();
        let orphan = user("ghost@example.com");
        assert!(storage.save(&token_for(&orphan, "x")).await.is_err());

        storage.create(&orphan).await.unwrap();
        storage.save(&token_for(&orphan, "x")).await.unwrap();
        assert_eq!(storage.tokens_for_user(orphan.id).await.len(), 1);
    }
}
