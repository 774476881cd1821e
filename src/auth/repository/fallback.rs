use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::OAuthTokenRepository;
use crate::auth::error::AuthError;
use crate::auth::token::OAuthToken;

/// Primary repository with a read-through secondary.
///
/// A token found only in the secondary is written back to the primary
/// (read-repair). Writes and deletes touch the primary only.
pub struct FallbackOAuthTokenRepository {
    primary: Arc<dyn OAuthTokenRepository>,
    secondary: Arc<dyn OAuthTokenRepository>,
}

impl FallbackOAuthTokenRepository {
    pub fn new(
        primary: Arc<dyn OAuthTokenRepository>,
        secondary: Arc<dyn OAuthTokenRepository>,
    ) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl OAuthTokenRepository for FallbackOAuthTokenRepository {
    async fn get(&self, user_id: &str) -> Result<OAuthToken, AuthError> {
        match self.primary.get(user_id).await {
            Ok(token) => Ok(token),
            Err(primary_error) => {
                debug!(user_id = %user_id, error = %primary_error, "primary token read failed, trying secondary");
                let token = self.secondary.get(user_id).await?;
                if let Err(err) = self.primary.set(user_id, &token).await {
                    warn!(user_id = %user_id, error = %err, "failed to repair primary token repository");
                }
                Ok(token)
            }
        }
    }

    async fn set(&self, user_id: &str, token: &OAuthToken) -> Result<(), AuthError> {
        self.primary.set(user_id, token).await
    }

    async fn delete(&self, user_id: &str) -> Result<(), AuthError> {
        self.primary.delete(user_id).await
    }
}
