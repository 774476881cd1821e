use async_trait::async_trait;
use serde::Deserialize;

use super::device_flow::{DeviceAuthorizationProvider, DeviceCodeGrant, DeviceTokenExchange};
use crate::auth::error::AuthError;
use crate::auth::token::OAuthToken;

const DEFAULT_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
const DEFAULT_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const DEFAULT_SCOPE: &str = "repo read:user";
const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// GitHub device authorization for a GitHub App or OAuth app.
///
/// # Example
/// ```no_run
/// use docport::cli_session::{DeviceAuthorizationProvider, GitHubDeviceAuthorizationProvider};
///
/// # async fn example() -> Result<(), docport::auth::AuthError> {
/// let github = GitHubDeviceAuthorizationProvider::new("Iv1.0123456789abcdef");
/// let grant = github.request_device_code().await?;
/// println!("Enter {} at {}", grant.user_code, grant.verification_uri);
/// # Ok(())
/// # }
/// ```
pub struct GitHubDeviceAuthorizationProvider {
    client: reqwest::Client,
    client_id: String,
    scope: String,
    device_code_url: String,
    access_token_url: String,
}

impl GitHubDeviceAuthorizationProvider {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            scope: DEFAULT_SCOPE.to_string(),
            device_code_url: DEFAULT_DEVICE_CODE_URL.to_string(),
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_string(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_device_code_url(mut self, url: impl Into<String>) -> Self {
        self.device_code_url = url.into();
        self
    }

    pub fn with_access_token_url(mut self, url: impl Into<String>) -> Self {
        self.access_token_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct DeviceTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

#[async_trait]
impl DeviceAuthorizationProvider for GitHubDeviceAuthorizationProvider {
    async fn request_device_code(&self) -> Result<DeviceCodeGrant, AuthError> {
        let resp = self
            .client
            .post(&self.device_code_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "Device code request failed with status {}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }

    async fn exchange_device_code(
        &self,
        device_code: &str,
    ) -> Result<DeviceTokenExchange, AuthError> {
        let resp = self
            .client
            .post(&self.access_token_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("device_code", device_code),
                ("grant_type", DEVICE_CODE_GRANT_TYPE),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "Device token request failed with status {}",
                resp.status()
            )));
        }

        let payload: DeviceTokenResponse = resp.json().await?;
        if let Some(access_token) = payload.access_token {
            return Ok(DeviceTokenExchange::Authorized {
                token: OAuthToken::new(access_token, payload.refresh_token),
                expires_in: payload.expires_in,
            });
        }
        match payload.error.as_deref() {
            Some("authorization_pending") => Ok(DeviceTokenExchange::Pending),
            Some("slow_down") => Ok(DeviceTokenExchange::SlowDown),
            Some("expired_token") => Err(AuthError::unauthorized("device code expired")),
            Some("access_denied") => Err(AuthError::unauthorized("authorization denied")),
            Some(other) => Err(AuthError::InvalidResponse(format!(
                "Device code error: {other}{}",
                payload
                    .error_description
                    .map(|description| format!(" ({description})"))
                    .unwrap_or_default()
            ))),
            None => Err(AuthError::InvalidResponse(
                "Device code response missing token and error".to_string(),
            )),
        }
    }
}
