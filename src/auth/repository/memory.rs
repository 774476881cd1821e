use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::OAuthTokenRepository;
use crate::auth::error::AuthError;
use crate::auth::token::OAuthToken;

/// Process-local repository for development and tests.
#[derive(Debug, Default)]
pub struct MemoryOAuthTokenRepository {
    tokens: Mutex<HashMap<String, OAuthToken>>,
}

impl MemoryOAuthTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tokens(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, OAuthToken>>, AuthError> {
        self.tokens
            .lock()
            .map_err(|_| AuthError::Storage("token map lock poisoned".to_string()))
    }
}

#[async_trait]
impl OAuthTokenRepository for MemoryOAuthTokenRepository {
    async fn get(&self, user_id: &str) -> Result<OAuthToken, AuthError> {
        self.tokens()?.get(user_id).cloned().ok_or(AuthError::NotFound)
    }

    async fn set(&self, user_id: &str, token: &OAuthToken) -> Result<(), AuthError> {
        self.tokens()?.insert(user_id.to_string(), token.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), AuthError> {
        self.tokens()?.remove(user_id);
        Ok(())
    }
}
