use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::auth::error::AuthError;
use crate::auth::persisting::persist_best_effort;
use crate::auth::repository::OAuthTokenRepository;
use crate::auth::session::UserIdReader;
use crate::auth::source::OAuthTokenDataSource;
use crate::auth::token::OAuthToken;

/// Copies the token GitHub issued at sign-in into the destination repository.
pub struct GitHubOAuthTokenTransferrer {
    user_id_reader: Arc<dyn UserIdReader>,
    source: Arc<dyn OAuthTokenDataSource>,
    destination: Arc<dyn OAuthTokenRepository>,
}

impl GitHubOAuthTokenTransferrer {
    pub fn new(
        user_id_reader: Arc<dyn UserIdReader>,
        source: Arc<dyn OAuthTokenDataSource>,
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
impl OAuthTokenDataSource for GitHubOAuthTokenTransferrer {
    async fn get_oauth_token(&self) -> Result<OAuthToken, AuthError> {
        let user_id = self.user_id_reader.user_id().await?;
        let token = self.source.get_oauth_token().await?;
        persist_best_effort(self.destination.as_ref(), &user_id, &token).await;
        debug!(user_id = %user_id, "transferred GitHub token");
        Ok(token)
    }
}
