use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::CredentialsTransferrer;
use crate::auth::error::AuthError;
use crate::auth::persisting::persist_best_effort;
use crate::auth::refresher::OAuthTokenRefresher;
use crate::auth::repository::OAuthTokenRepository;
use crate::auth::token::OAuthToken;
use crate::kv::KeyValueStore;

/// Reads refresh tokens held by the hosting environment.
#[async_trait]
pub trait HostRefreshTokenReader: Send + Sync {
    /// Fails with [`AuthError::NotFound`] when the host holds nothing for the user.
    async fn host_refresh_token(&self, user_id: &str) -> Result<String, AuthError>;
}

/// Host refresh tokens stored under `host-refresh-token:{user_id}`.
pub struct KeyValueHostRefreshTokenReader {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueHostRefreshTokenReader {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HostRefreshTokenReader for KeyValueHostRefreshTokenReader {
    async fn host_refresh_token(&self, user_id: &str) -> Result<String, AuthError> {
        self.store
            .get(&format!("host-refresh-token:{user_id}"))
            .await?
            .ok_or(AuthError::NotFound)
    }
}

/// Seeds the local repository from a host-held refresh token.
///
/// The refresh token is redeemed immediately, so the stored pair is fresh.
pub struct HostCredentialsTransferrer {
    reader: Arc<dyn HostRefreshTokenReader>,
    refresher: Arc<dyn OAuthTokenRefresher>,
    destination: Arc<dyn OAuthTokenRepository>,
}

impl HostCredentialsTransferrer {
    pub fn new(
        reader: Arc<dyn HostRefreshTokenReader>,
        refresher: Arc<dyn OAuthTokenRefresher>,
        destination: Arc<dyn OAuthTokenRepository>,
    ) -> Self {
        Self {
            reader,
            refresher,
            destination,
        }
    }
}

#[async_trait]
impl CredentialsTransferrer for HostCredentialsTransferrer {
    async fn transfer_credentials(&self, user_id: &str) -> Result<OAuthToken, AuthError> {
        let refresh_token = self.reader.host_refresh_token(user_id).await?;
        // Only the refresh half is known; the refresher never reads the access half.
        let seed = OAuthToken::new(String::new(), Some(refresh_token));
        let token = self.refresher.refresh_oauth_token(&seed).await?;
        persist_best_effort(self.destination.as_ref(), user_id, &token).await;
        info!(user_id = %user_id, "transferred host credentials");
        Ok(token)
    }
}
