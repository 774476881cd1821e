//! Single-flight wrappers that persist what they produce.
//!
//! Both wrappers follow the same shape: try the repository, and only on a
//! miss take the per-user lock, read the repository again, and run the
//! expensive producer if the second read still misses. Callers that queued
//! on the lock find the winner's token on their re-check.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::error::AuthError;
use super::lock::{with_lock, LockProvider};
use super::refresher::OAuthTokenRefresher;
use super::repository::OAuthTokenRepository;
use super::session::UserIdReader;
use super::source::OAuthTokenDataSource;
use super::token::OAuthToken;

fn lock_key(namespace: &str, user_id: &str) -> String {
    format!("{namespace}:{user_id}")
}

/// Stores `token` and logs, rather than returns, a failed write.
pub(crate) async fn persist_best_effort(
    repository: &dyn OAuthTokenRepository,
    user_id: &str,
    token: &OAuthToken,
) {
    if let Err(err) = repository.set(user_id, token).await {
        warn!(user_id = %user_id, error = %err, "failed to persist token; returning it anyway");
    }
}

/// Returns the stored token, producing and storing one on first use.
pub struct PersistingOAuthTokenDataSource {
    user_id_reader: Arc<dyn UserIdReader>,
    repository: Arc<dyn OAuthTokenRepository>,
    producer: Arc<dyn OAuthTokenDataSource>,
    lock: Arc<dyn LockProvider>,
    namespace: String,
}

impl PersistingOAuthTokenDataSource {
    pub fn new(
        user_id_reader: Arc<dyn UserIdReader>,
        repository: Arc<dyn OAuthTokenRepository>,
        producer: Arc<dyn OAuthTokenDataSource>,
        lock: Arc<dyn LockProvider>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            user_id_reader,
            repository,
            producer,
            lock,
            namespace: namespace.into(),
        }
    }

    pub(crate) fn repository(&self) -> &Arc<dyn OAuthTokenRepository> {
        &self.repository
    }

    pub(crate) fn user_id_reader(&self) -> &Arc<dyn UserIdReader> {
        &self.user_id_reader
    }

    /// Lock-free read. `Ok(None)` only for a miss; other failures propagate.
    async fn read(&self, user_id: &str) -> Result<Option<OAuthToken>, AuthError> {
        match self.repository.get(user_id).await {
            Ok(token) => Ok(Some(token)),
            Err(AuthError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl OAuthTokenDataSource for PersistingOAuthTokenDataSource {
    async fn get_oauth_token(&self) -> Result<OAuthToken, AuthError> {
        let user_id = self.user_id_reader.user_id().await?;
        if let Some(token) = self.read(&user_id).await? {
            return Ok(token);
        }

        let key = lock_key(&self.namespace, &user_id);
        with_lock(self.lock.as_ref(), &key, || async {
            if let Some(token) = self.read(&user_id).await? {
                debug!(user_id = %user_id, "token populated while waiting for lock");
                return Ok(token);
            }
            let token = self.producer.get_oauth_token().await?;
            persist_best_effort(self.repository.as_ref(), &user_id, &token).await;
            Ok(token)
        })
        .await
    }
}

/// Refreshes under the per-user lock, skipping requests already satisfied.
///
/// If the stored token no longer matches the one being refreshed, another
/// caller has refreshed it in the meantime and the stored token is returned
/// without a remote call.
pub struct PersistingOAuthTokenRefresher {
    user_id_reader: Arc<dyn UserIdReader>,
    repository: Arc<dyn OAuthTokenRepository>,
    refresher: Arc<dyn OAuthTokenRefresher>,
    lock: Arc<dyn LockProvider>,
    namespace: String,
}

impl PersistingOAuthTokenRefresher {
    pub fn new(
        user_id_reader: Arc<dyn UserIdReader>,
        repository: Arc<dyn OAuthTokenRepository>,
        refresher: Arc<dyn OAuthTokenRefresher>,
        lock: Arc<dyn LockProvider>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            user_id_reader,
            repository,
            refresher,
            lock,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl OAuthTokenRefresher for PersistingOAuthTokenRefresher {
    async fn refresh_oauth_token(&self, token: &OAuthToken) -> Result<OAuthToken, AuthError> {
        let user_id = self.user_id_reader.user_id().await?;
        let key = lock_key(&self.namespace, &user_id);
        with_lock(self.lock.as_ref(), &key, || async {
            let stored = match self.repository.get(&user_id).await {
                Ok(stored) => Some(stored),
                Err(AuthError::NotFound) => None,
                Err(err) => return Err(err),
            };
            if let Some(stored) = stored {
                if stored.access_token != token.access_token {
                    debug!(user_id = %user_id, "token already refreshed by another caller");
                    return Ok(stored);
                }
            }
            let refreshed = self.refresher.refresh_oauth_token(token).await?;
            persist_best_effort(self.repository.as_ref(), &user_id, &refreshed).await;
            Ok(refreshed)
        })
        .await
    }
}
