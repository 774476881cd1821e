use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::auth::error::AuthError;
use crate::auth::persisting::persist_best_effort;
use crate::auth::repository::OAuthTokenRepository;
use crate::auth::session::UserIdReader;
use crate::auth::source::OAuthTokenDataSource;
use crate::auth::token::OAuthToken;

/// Reads the destination, migrating from the source on a miss.
///
/// Used to move tokens out of a legacy store one user at a time.
pub struct TransferringOAuthTokenDataSource {
    user_id_reader: Arc<dyn UserIdReader>,
    source: Arc<dyn OAuthTokenRepository>,
    destination: Arc<dyn OAuthTokenRepository>,
}

impl TransferringOAuthTokenDataSource {
    pub fn new(
        user_id_reader: Arc<dyn UserIdReader>,
        source: Arc<dyn OAuthTokenRepository>,
        destination: Arc<dyn OAuthTokenRepository>,
    ) -> Self {
        Self {
            user_id_reader,
            source,
            destination,
        }
    }
}

#[async_trait]
impl OAuthTokenDataSource for TransferringOAuthTokenDataSource {
    async fn get_oauth_token(&self) -> Result<OAuthToken, AuthError> {
        let user_id = self.user_id_reader.user_id().await?;
        match self.destination.get(&user_id).await {
            Ok(token) => return Ok(token),
            Err(AuthError::NotFound) => {}
            Err(err) => return Err(err),
        }
        let token = self.source.get(&user_id).await?;
        persist_best_effort(self.destination.as_ref(), &user_id, &token).await;
        info!(user_id = %user_id, "migrated token from source repository");
        Ok(token)
    }
}
