//! Remote token refreshers.

pub mod entra;
pub mod github;

pub use entra::EntraOAuthTokenRefresher;
pub use github::GitHubOAuthTokenRefresher;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::AuthError;
use super::source::OAuthTokenDataSource;
use super::token::OAuthToken;

/// Exchanges a token for a fresh one.
#[async_trait]
pub trait OAuthTokenRefresher: Send + Sync {
    async fn refresh_oauth_token(&self, token: &OAuthToken) -> Result<OAuthToken, AuthError>;
}

/// Refreshes renewable tokens and re-issues non-renewable ones.
///
/// Installation tokens carry no refresh token; the only way to replace one is
/// to ask the issuing data source again.
pub struct ReissuingOAuthTokenRefresher {
    refresher: Arc<dyn OAuthTokenRefresher>,
    source: Arc<dyn OAuthTokenDataSource>,
}

impl ReissuingOAuthTokenRefresher {
    pub fn new(
        refresher: Arc<dyn OAuthTokenRefresher>,
        source: Arc<dyn OAuthTokenDataSource>,
    ) -> Self {
        Self { refresher, source }
    }
}

#[async_trait]
impl OAuthTokenRefresher for ReissuingOAuthTokenRefresher {
    async fn refresh_oauth_token(&self, token: &OAuthToken) -> Result<OAuthToken, AuthError> {
        if token.is_refreshable() {
            self.refresher.refresh_oauth_token(token).await
        } else {
            self.source.get_oauth_token().await
        }
    }
}

/// Token endpoint payload shared by GitHub and the Microsoft identity platform.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenEndpointResponse {
    /// Keeps the previous refresh token when the endpoint does not rotate it.
    fn into_token(self, previous: &OAuthToken, provider: &str) -> Result<OAuthToken, AuthError> {
        if let Some(access_token) = self.access_token {
            let refresh_token = self.refresh_token.or_else(|| previous.refresh_token.clone());
            return Ok(OAuthToken::new(access_token, refresh_token));
        }
        match self.error {
            Some(error) => Err(AuthError::Unauthorized(format!(
                "{provider} rejected refresh: {error}{}",
                self.error_description
                    .map(|description| format!(" ({description})"))
                    .unwrap_or_default()
            ))),
            None => Err(AuthError::InvalidResponse(format!(
                "{provider} refresh response missing token and error"
            ))),
        }
    }
}

fn refresh_token_of(token: &OAuthToken) -> Result<&str, AuthError> {
    token
        .refresh_token
        .as_deref()
        .ok_or_else(|| AuthError::unauthorized("token has no refresh token"))
}
