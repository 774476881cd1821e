use std::sync::Arc;

use async_trait::async_trait;

use super::OAuthTokenRepository;
use crate::auth::error::AuthError;
use crate::auth::token::OAuthToken;
use crate::kv::KeyValueStore;

/// Repository storing each token as JSON under `oauth-token:{provider}:{user_id}`.
pub struct KeyValueOAuthTokenRepository {
    store: Arc<dyn KeyValueStore>,
    provider: String,
}

impl KeyValueOAuthTokenRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, provider: impl Into<String>) -> Self {
        Self {
            store,
            provider: provider.into(),
        }
    }

    fn key(&self, user_id: &str) -> String {
        format!("oauth-token:{}:{user_id}", self.provider)
    }
}

#[async_trait]
impl OAuthTokenRepository for KeyValueOAuthTokenRepository {
    async fn get(&self, user_id: &str) -> Result<OAuthToken, AuthError> {
        let raw = self
            .store
            .get(&self.key(user_id))
            .await?
            .ok_or(AuthError::NotFound)?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn set(&self, user_id: &str, token: &OAuthToken) -> Result<(), AuthError> {
        let raw = serde_json::to_string(token)?;
        self.store.set(&self.key(user_id), &raw).await
    }

    async fn delete(&self, user_id: &str) -> Result<(), AuthError> {
        self.store.delete(&self.key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;

    #[tokio::test]
    async fn tokens_are_namespaced_by_provider() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let github = KeyValueOAuthTokenRepository::new(store.clone(), "github");
        let azure = KeyValueOAuthTokenRepository::new(store.clone(), "azure-devops");

        let token = OAuthToken::new("gh-access", Some("gh-refresh".to_string()));
        github.set("user-1", &token).await.unwrap();

        assert_eq!(github.get("user-1").await.unwrap(), token);
        assert!(azure.get("user-1").await.unwrap_err().is_not_found());
        assert!(store
            .get("oauth-token:github:user-1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn delete_removes_token() {
        let repo = KeyValueOAuthTokenRepository::new(Arc::new(MemoryKeyValueStore::new()), "github");
        repo.set("user-1", &OAuthToken::non_refreshable("a"))
            .await
            .unwrap();
        repo.delete("user-1").await.unwrap();
        assert!(repo.get("user-1").await.unwrap_err().is_not_found());
    }
}
