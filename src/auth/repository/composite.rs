use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use super::OAuthTokenRepository;
use crate::auth::error::AuthError;
use crate::auth::token::OAuthToken;

/// Reads from the first member that has a token; writes to every member.
///
/// `get` stops at the first success. When every member fails, the last
/// member's error is returned. `set` and `delete` always reach all members,
/// then report the first failure, if any.
pub struct CompositeOAuthTokenRepository {
    repositories: Vec<Arc<dyn OAuthTokenRepository>>,
}

impl CompositeOAuthTokenRepository {
    pub fn new(repositories: Vec<Arc<dyn OAuthTokenRepository>>) -> Self {
        Self { repositories }
    }

    fn first_error(results: Vec<Result<(), AuthError>>) -> Result<(), AuthError> {
        results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
    }
}

#[async_trait]
impl OAuthTokenRepository for CompositeOAuthTokenRepository {
    async fn get(&self, user_id: &str) -> Result<OAuthToken, AuthError> {
        let mut last_error = AuthError::NotFound;
        for repository in &self.repositories {
            match repository.get(user_id).await {
                Ok(token) => return Ok(token),
                Err(err) => last_error = err,
            }
        }
        Err(last_error)
    }

    async fn set(&self, user_id: &str, token: &OAuthToken) -> Result<(), AuthError> {
        let writes = self
            .repositories
            .iter()
            .map(|repository| repository.set(user_id, token));
        Self::first_error(join_all(writes).await)
    }

    async fn delete(&self, user_id: &str) -> Result<(), AuthError> {
        let deletes = self
            .repositories
            .iter()
            .map(|repository| repository.delete(user_id));
        Self::first_error(join_all(deletes).await)
    }
}
