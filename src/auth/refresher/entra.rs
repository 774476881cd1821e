use async_trait::async_trait;

use super::{refresh_token_of, OAuthTokenRefresher, TokenEndpointResponse};
use crate::auth::error::AuthError;
use crate::auth::token::OAuthToken;

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
/// Azure DevOps resource scope plus offline access for refresh tokens.
pub const AZURE_DEVOPS_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default offline_access";

/// Refreshes Microsoft Entra ID tokens used for Azure DevOps.
pub struct EntraOAuthTokenRefresher {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl EntraOAuthTokenRefresher {
    pub fn new(
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: format!("{DEFAULT_AUTHORITY}/{tenant_id}/oauth2/v2.0/token"),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: AZURE_DEVOPS_SCOPE.to_string(),
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

#[async_trait]
impl OAuthTokenRefresher for EntraOAuthTokenRefresher {
    async fn refresh_oauth_token(&self, token: &OAuthToken) -> Result<OAuthToken, AuthError> {
        let refresh_token = refresh_token_of(token)?;
        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() || status.is_client_error() {
            // The identity platform reports invalid_grant and friends as 4xx with a JSON body.
            let payload: TokenEndpointResponse = resp.json().await.map_err(|err| {
                AuthError::InvalidResponse(format!(
                    "Entra token refresh returned unreadable body with status {status}: {err}"
                ))
            })?;
            return payload.into_token(token, "Entra ID");
        }
        Err(AuthError::InvalidResponse(format!(
            "Entra token refresh failed with status {status}"
        )))
    }
}
