//! SQL-backed leaf repositories.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::OAuthTokenRepository;
use crate::auth::error::AuthError;
use crate::auth::token::OAuthToken;

/// Writable token table owned by this service.
pub struct SqlOAuthTokenRepository {
    pool: SqlitePool,
    provider: String,
}

impl SqlOAuthTokenRepository {
    pub fn new(pool: SqlitePool, provider: impl Into<String>) -> Self {
        Self {
            pool,
            provider: provider.into(),
        }
    }

    /// Create the `oauth_tokens` table if it does not exist.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS oauth_tokens (
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, provider)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OAuthTokenRepository for SqlOAuthTokenRepository {
    async fn get(&self, user_id: &str) -> Result<OAuthToken, AuthError> {
        let row: Option<(String, Option<String>)> = sqlx::query_as(
            "SELECT access_token, refresh_token FROM oauth_tokens WHERE user_id = ? AND provider = ?",
        )
        .bind(user_id)
        .bind(&self.provider)
        .fetch_optional(&self.pool)
        .await?;
        let (access_token, refresh_token) = row.ok_or(AuthError::NotFound)?;
        Ok(OAuthToken::new(access_token, refresh_token))
    }

    async fn set(&self, user_id: &str, token: &OAuthToken) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_tokens (user_id, provider, access_token, refresh_token, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&self.provider)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM oauth_tokens WHERE user_id = ? AND provider = ?")
            .bind(user_id)
            .bind(&self.provider)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Tokens owned by the identity integration's `accounts` table.
///
/// The identity integration is the only writer of that table, so `set` and
/// `delete` fail with [`AuthError::NotImplemented`].
pub struct IdentityAccountTokenRepository {
    pool: SqlitePool,
    provider: String,
}

impl IdentityAccountTokenRepository {
    pub fn new(pool: SqlitePool, provider: impl Into<String>) -> Self {
        Self {
            pool,
            provider: provider.into(),
        }
    }
}

#[async_trait]
impl OAuthTokenRepository for IdentityAccountTokenRepository {
    async fn get(&self, user_id: &str) -> Result<OAuthToken, AuthError> {
        let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT access_token, refresh_token FROM accounts WHERE user_id = ? AND provider = ?",
        )
        .bind(user_id)
        .bind(&self.provider)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some((Some(access_token), refresh_token)) => {
                Ok(OAuthToken::new(access_token, refresh_token))
            }
            _ => Err(AuthError::NotFound),
        }
    }

    async fn set(&self, _user_id: &str, _token: &OAuthToken) -> Result<(), AuthError> {
        Err(AuthError::NotImplemented(
            "identity account tokens are read-only".to_string(),
        ))
    }

    async fn delete(&self, _user_id: &str) -> Result<(), AuthError> {
        Err(AuthError::NotImplemented(
            "identity account tokens are read-only".to_string(),
        ))
    }
}
