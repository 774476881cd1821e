use async_trait::async_trait;
use reqwest::StatusCode;

use super::{refresh_token_of, OAuthTokenRefresher, TokenEndpointResponse};
use crate::auth::error::AuthError;
use crate::auth::token::OAuthToken;

const DEFAULT_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

/// Refreshes expiring GitHub user-to-server tokens.
///
/// GitHub answers refresh failures with `200 OK` and an `error` field, so the
/// body decides the outcome, not the status.
pub struct GitHubOAuthTokenRefresher {
    client: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    access_token_url: String,
}

impl GitHubOAuthTokenRefresher {
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret,
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_string(),
        }
    }

    pub fn with_access_token_url(mut self, url: impl Into<String>) -> Self {
        self.access_token_url = url.into();
        self
    }
}

#[async_trait]
impl OAuthTokenRefresher for GitHubOAuthTokenRefresher {
    async fn refresh_oauth_token(&self, token: &OAuthToken) -> Result<OAuthToken, AuthError> {
        let refresh_token = refresh_token_of(token)?;
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let resp = self
            .client
            .post(&self.access_token_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(AuthError::unauthorized("GitHub rejected client credentials"));
        }
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "GitHub token refresh failed with status {}",
                resp.status()
            )));
        }
        let payload: TokenEndpointResponse = resp.json().await?;
        payload.into_token(token, "GitHub")
    }
}
