//! GitHub App installation tokens scoped to selected repositories.

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::error::AuthError;

const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Mints installation access tokens.
#[async_trait]
pub trait InstallationTokenIssuer: Send + Sync {
    /// Issues a token that can reach exactly `repositories`.
    async fn issue_installation_token(&self, repositories: &[String]) -> Result<String, AuthError>;
}

/// Identity of a GitHub App installation.
#[derive(Clone)]
pub struct GitHubAppCredentials {
    pub app_id: String,
    pub private_key_pem: String,
    pub installation_id: u64,
}

impl fmt::Debug for GitHubAppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubAppCredentials")
            .field("app_id", &self.app_id)
            .field("private_key_pem", &"<redacted>")
            .field("installation_id", &self.installation_id)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct AppClaims<'a> {
    iat: i64,
    exp: i64,
    iss: &'a str,
}

#[derive(Debug, Serialize)]
struct AccessTokensRequest<'a> {
    repositories: &'a [String],
}

#[derive(Debug, Deserialize)]
struct AccessTokensResponse {
    token: String,
}

/// Signs an app JWT and exchanges it for an installation token.
pub struct GitHubAppInstallationTokenIssuer {
    client: reqwest::Client,
    api_base_url: String,
    app_id: String,
    installation_id: u64,
    key: EncodingKey,
}

impl GitHubAppInstallationTokenIssuer {
    /// Fails if the private key is not an RSA PEM.
    pub fn new(credentials: GitHubAppCredentials) -> Result<Self, AuthError> {
        let key = EncodingKey::from_rsa_pem(credentials.private_key_pem.as_bytes())?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            app_id: credentials.app_id,
            installation_id: credentials.installation_id,
            key,
        })
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// App JWTs may live ten minutes; `iat` is backdated for clock drift.
    fn app_jwt(&self) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = AppClaims {
            iat: now - 60,
            exp: now + 540,
            iss: &self.app_id,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.key,
        )?)
    }
}

#[async_trait]
impl InstallationTokenIssuer for GitHubAppInstallationTokenIssuer {
    async fn issue_installation_token(&self, repositories: &[String]) -> Result<String, AuthError> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base_url, self.installation_id
        );
        debug!(installation_id = self.installation_id, repositories = repositories.len(), "requesting installation token");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.app_jwt()?)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "docport")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .json(&AccessTokensRequest { repositories })
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::unauthorized("GitHub rejected the app JWT"));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::InvalidResponse(format!(
                "installation token request failed with status {status}: {body}"
            )));
        }
        let payload: AccessTokensResponse = resp.json().await?;
        Ok(payload.token)
    }
}
