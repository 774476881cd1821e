use std::sync::Arc;

use async_trait::async_trait;

use super::error::AuthError;
use super::repository::OAuthTokenRepository;
use super::session::UserIdReader;
use super::token::OAuthToken;

/// Produces a token for the current user.
///
/// Implementations range from a plain repository read to a cross-provider
/// transfer that calls out to an identity provider.
#[async_trait]
pub trait OAuthTokenDataSource: Send + Sync {
    async fn get_oauth_token(&self) -> Result<OAuthToken, AuthError>;
}

/// Reads the current user's token straight from a repository.
pub struct RepositoryOAuthTokenDataSource {
    user_id_reader: Arc<dyn UserIdReader>,
    repository: Arc<dyn OAuthTokenRepository>,
}

impl RepositoryOAuthTokenDataSource {
    pub fn new(
        user_id_reader: Arc<dyn UserIdReader>,
        repository: Arc<dyn OAuthTokenRepository>,
    ) -> Self {
        Self {
            user_id_reader,
            repository,
        }
    }
}

#[async_trait]
impl OAuthTokenDataSource for RepositoryOAuthTokenDataSource {
    async fn get_oauth_token(&self) -> Result<OAuthToken, AuthError> {
        let user_id = self.user_id_reader.user_id().await?;
        self.repository.get(&user_id).await
    }
}
