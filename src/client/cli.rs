//! Clients authenticated by a device-flow [`CliSession`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::http::{post_graphql, shared_client};
use super::retry::AuthRetryPolicy;
use super::{AuthFailureClassifier, ClientError};
use crate::auth::access_token::AccessTokenProvider;
use crate::auth::error::AuthError;
use crate::auth::refresher::OAuthTokenRefresher;
use crate::cli_session::{CliSession, CliSessionStore};

/// Tokens taken from, and refreshed into, one CLI session.
///
/// A refresh rewrites the in-memory session and persists it. Sessions
/// without a refresh token cannot be refreshed, so auth failures on them
/// surface immediately.
pub struct CliSessionTokens {
    session: Mutex<CliSession>,
    store: Arc<dyn CliSessionStore>,
    refresher: Arc<dyn OAuthTokenRefresher>,
}

impl CliSessionTokens {
    pub fn new(
        session: CliSession,
        store: Arc<dyn CliSessionStore>,
        refresher: Arc<dyn OAuthTokenRefresher>,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            store,
            refresher,
        }
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> CliSession {
        self.session.lock().await.clone()
    }
}

#[async_trait]
impl AccessTokenProvider for CliSessionTokens {
    async fn get_access_token(&self) -> Result<String, AuthError> {
        Ok(self.session.lock().await.access_token.clone())
    }

    async fn refresh_access_token(&self, old_access_token: &str) -> Result<String, AuthError> {
        let mut session = self.session.lock().await;
        if session.access_token != old_access_token {
            debug!(session_id = %session.session_id, "CLI session already refreshed");
            return Ok(session.access_token.clone());
        }

        let refreshed = self
            .refresher
            .refresh_oauth_token(&session.oauth_token())
            .await?;
        session.apply_token(refreshed);
        if let Err(err) = self.store.set(&session).await {
            warn!(session_id = %session.session_id, error = %err, "failed to persist refreshed CLI session");
        }
        info!(session_id = %session.session_id, "refreshed CLI session");
        Ok(session.access_token.clone())
    }

    async fn can_refresh(&self) -> bool {
        self.session.lock().await.refresh_token.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct RepositoriesData {
    repositories: Vec<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    full_name: String,
}

const REPOSITORIES_QUERY: &str = "query Repositories { repositories { fullName } }";

/// GraphQL client for the docport API, authenticated as a CLI session.
pub struct CliGraphQLClient {
    client: reqwest::Client,
    graphql_url: String,
    retry: AuthRetryPolicy,
}

impl CliGraphQLClient {
    pub fn new(tokens: Arc<CliSessionTokens>, graphql_url: impl Into<String>) -> Self {
        Self {
            client: shared_client().clone(),
            graphql_url: graphql_url.into(),
            retry: AuthRetryPolicy::new(tokens, AuthFailureClassifier::Unauthorized),
        }
    }

    pub async fn query(&self, query: &str, variables: Value) -> Result<Value, ClientError> {
        self.retry
            .execute(|token| {
                let variables = &variables;
                async move {
                    post_graphql(&self.client, &self.graphql_url, &token, query, variables).await
                }
            })
            .await
    }

    /// Full names of the repositories the session's user can read.
    pub async fn list_repositories(&self) -> Result<Vec<String>, ClientError> {
        let variables = json!({});
        let data: RepositoriesData = self
            .retry
            .execute(|token| {
                let variables = &variables;
                async move {
                    post_graphql(
                        &self.client,
                        &self.graphql_url,
                        &token,
                        REPOSITORIES_QUERY,
                        variables,
                    )
                    .await
                }
            })
            .await?;
        Ok(data
            .repositories
            .into_iter()
            .map(|repository| repository.full_name)
            .collect())
    }
}
