use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::error::AuthError;
use super::lock::LockProvider;
use super::persisting::{persist_best_effort, PersistingOAuthTokenDataSource};
use super::refresher::OAuthTokenRefresher;
use super::repository::OAuthTokenRepository;
use super::session::UserIdReader;
use super::source::OAuthTokenDataSource;
use super::token::OAuthToken;

/// Hands out access tokens for the current user and renews them on demand.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn get_access_token(&self) -> Result<String, AuthError>;

    /// Replaces `old_access_token`, which a remote service just rejected.
    async fn refresh_access_token(&self, old_access_token: &str) -> Result<String, AuthError>;

    /// `false` when a refresh cannot succeed, so callers should surface the
    /// original failure instead of attempting one.
    async fn can_refresh(&self) -> bool {
        true
    }
}

/// Per-user token acquisition and refresh for one provider.
///
/// `get_access_token` is single-flight per user: the fast path is a plain
/// repository read; a miss takes the distributed lock and re-checks before
/// invoking the producer (a transferrer or refresher).
///
/// `refresh_access_token` compares the rejected token against the stored one
/// and only calls the remote refresher while they still match. This suppresses
/// refresh storms when many requests see the same expired token, but the read
/// and the write are separate operations, not a compare-and-swap: two callers
/// racing through the comparison can both refresh. That costs one wasted
/// refresh and is otherwise harmless.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use docport::auth::{
///     AccessTokenProvider, AccessTokenService, AccountProvider, GitHubOAuthTokenRefresher,
///     KeyValueLockProvider, KeyValueOAuthTokenRepository, RepositoryOAuthTokenDataSource,
///     SessionUser, StaticSessionReader,
/// };
/// use docport::kv::MemoryKeyValueStore;
///
/// # async fn example() -> Result<(), docport::auth::AuthError> {
/// let kv = Arc::new(MemoryKeyValueStore::new());
/// let session = Arc::new(StaticSessionReader::new(SessionUser::new("user-1", AccountProvider::GitHub)));
/// let repository = Arc::new(KeyValueOAuthTokenRepository::new(kv.clone(), "github"));
/// let service = AccessTokenService::new(
///     session.clone(),
///     repository.clone(),
///     Arc::new(RepositoryOAuthTokenDataSource::new(session, repository)),
///     Arc::new(GitHubOAuthTokenRefresher::new("client-id", None)),
///     Arc::new(KeyValueLockProvider::new(kv)),
///     "github",
/// );
/// let _token = service.get_access_token().await?;
/// # Ok(())
/// # }
/// ```
pub struct AccessTokenService {
    source: PersistingOAuthTokenDataSource,
    refresher: Arc<dyn OAuthTokenRefresher>,
}

impl AccessTokenService {
    pub fn new(
        user_id_reader: Arc<dyn UserIdReader>,
        repository: Arc<dyn OAuthTokenRepository>,
        producer: Arc<dyn OAuthTokenDataSource>,
        refresher: Arc<dyn OAuthTokenRefresher>,
        lock: Arc<dyn LockProvider>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            source: PersistingOAuthTokenDataSource::new(
                user_id_reader,
                repository,
                producer,
                lock,
                namespace,
            ),
            refresher,
        }
    }

    /// Forgets the current user's token, e.g. on sign-out.
    pub async fn clear(&self) -> Result<(), AuthError> {
        let user_id = self.source.user_id_reader().user_id().await?;
        info!(user_id = %user_id, "clearing stored token");
        self.source.repository().delete(&user_id).await
    }
}

#[async_trait]
impl OAuthTokenDataSource for AccessTokenService {
    async fn get_oauth_token(&self) -> Result<OAuthToken, AuthError> {
        self.source.get_oauth_token().await
    }
}

#[async_trait]
impl AccessTokenProvider for AccessTokenService {
    async fn get_access_token(&self) -> Result<String, AuthError> {
        Ok(self.source.get_oauth_token().await?.access_token)
    }

    async fn refresh_access_token(&self, old_access_token: &str) -> Result<String, AuthError> {
        let user_id = self.source.user_id_reader().user_id().await?;
        let repository = self.source.repository();
        let stored = repository.get(&user_id).await?;
        if stored.access_token != old_access_token {
            debug!(user_id = %user_id, "refresh already satisfied by another caller");
            return Ok(stored.access_token);
        }

        let refreshed = self.refresher.refresh_oauth_token(&stored).await?;
        persist_best_effort(repository.as_ref(), &user_id, &refreshed).await;
        info!(user_id = %user_id, "refreshed access token");
        Ok(refreshed.access_token)
    }
}
