use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http::{check_response, post_graphql, shared_client};
use super::retry::AuthRetryPolicy;
use super::{AuthFailureClassifier, ClientError};
use crate::auth::access_token::AccessTokenProvider;
use crate::auth::repository::ListReader;

const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

/// Repository as returned by `GET /user/repos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubRepository {
    pub full_name: String,
    pub name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// GitHub REST and GraphQL client for the current user.
pub struct GitHubClient {
    client: reqwest::Client,
    api_base_url: String,
    graphql_url: Option<String>,
    retry: AuthRetryPolicy,
}

impl GitHubClient {
    pub fn new(tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            client: shared_client().clone(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            graphql_url: None,
            retry: AuthRetryPolicy::new(tokens, AuthFailureClassifier::Unauthorized),
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Defaults to `{api_base_url}/graphql`.
    pub fn with_graphql_url(mut self, url: impl Into<String>) -> Self {
        self.graphql_url = Some(url.into());
        self
    }

    fn get(&self, path: &str, token: &str, accept: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.api_base_url))
            .bearer_auth(token)
            .header("Accept", accept)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    /// Every repository the user can access, across all pages.
    pub async fn list_repositories(&self) -> Result<Vec<GitHubRepository>, ClientError> {
        let mut repositories = Vec::new();
        for page in 1.. {
            let batch: Vec<GitHubRepository> = self
                .retry
                .execute(|token| async move {
                    let resp = self
                        .get("/user/repos", &token, JSON_MEDIA_TYPE)
                        .query(&[("per_page", PAGE_SIZE), ("page", page)])
                        .send()
                        .await?;
                    Ok(check_response(resp).await?.json().await?)
                })
                .await?;
            let last = batch.len() < PAGE_SIZE;
            repositories.extend(batch);
            if last {
                break;
            }
        }
        Ok(repositories)
    }

    /// Raw file content at `git_ref`, or the default branch when `None`.
    pub async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, ClientError> {
        let path = format!(
            "/repos/{owner}/{repo}/contents/{}",
            path.trim_start_matches('/')
        );
        self.retry
            .execute(|token| {
                let path = path.as_str();
                async move {
                    let mut request = self.get(path, &token, RAW_MEDIA_TYPE);
                    if let Some(git_ref) = git_ref {
                        request = request.query(&[("ref", git_ref)]);
                    }
                    Ok(check_response(request.send().await?).await?.text().await?)
                }
            })
            .await
    }

    /// Runs a GraphQL operation and returns its `data`.
    pub async fn graphql(&self, query: &str, variables: Value) -> Result<Value, ClientError> {
        let url = self
            .graphql_url
            .clone()
            .unwrap_or_else(|| format!("{}/graphql", self.api_base_url));
        self.retry
            .execute(|token| {
                let (url, variables) = (&url, &variables);
                async move { post_graphql(&self.client, url, &token, query, variables).await }
            })
            .await
    }
}

/// Repository full names, suitable for [`crate::auth::CachingListReader`].
#[async_trait]
impl ListReader<String> for GitHubClient {
    async fn read_list(&self, _user_id: &str) -> crate::error::Result<Vec<String>> {
        Ok(self
            .list_repositories()
            .await?
            .into_iter()
            .map(|repository| repository.full_name)
            .collect())
    }
}
