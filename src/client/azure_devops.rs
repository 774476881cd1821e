use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::http::{check_response, no_redirect_client};
use super::retry::AuthRetryPolicy;
use super::{AuthFailureClassifier, ClientError};
use crate::auth::access_token::AccessTokenProvider;

const API_VERSION: &str = "7.1";

/// Git repository in an Azure DevOps project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureRepository {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ItemContent {
    content: String,
}

/// Azure DevOps Git client for one organization.
///
/// Redirects are not followed: an expired Entra token on some endpoints
/// yields a 302 to the sign-in page, which the retry policy treats like a 401.
pub struct AzureDevOpsClient {
    client: reqwest::Client,
    base_url: String,
    retry: AuthRetryPolicy,
}

impl AzureDevOpsClient {
    pub fn new(organization: &str, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            client: no_redirect_client().clone(),
            base_url: format!("https://dev.azure.com/{organization}"),
            retry: AuthRetryPolicy::new(tokens, AuthFailureClassifier::AzureDevOps),
        }
    }

    /// Organization URL, e.g. `https://dev.azure.com/contoso`.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn repositories_url(&self, project: &str) -> String {
        format!("{}/{project}/_apis/git/repositories", self.base_url)
    }

    pub async fn list_repositories(&self, project: &str) -> Result<Vec<AzureRepository>, ClientError> {
        let url = self.repositories_url(project);
        self.retry
            .execute(|token| {
                let url = url.as_str();
                async move {
                    let resp = self
                        .client
                        .get(url)
                        .bearer_auth(&token)
                        .query(&[("api-version", API_VERSION)])
                        .send()
                        .await?;
                    let list: ValueList<AzureRepository> = check_response(resp).await?.json().await?;
                    Ok(list.value)
                }
            })
            .await
    }

    /// File content at `branch`, or the default branch when `None`.
    pub async fn get_file_content(
        &self,
        project: &str,
        repository: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<String, ClientError> {
        let url = format!("{}/{repository}/items", self.repositories_url(project));
        self.retry
            .execute(|token| {
                let url = url.as_str();
                async move {
                    let mut query = vec![
                        ("path", path),
                        ("includeContent", "true"),
                        ("api-version", API_VERSION),
                    ];
                    if let Some(branch) = branch {
                        query.push(("versionDescriptor.version", branch));
                        query.push(("versionDescriptor.versionType", "branch"));
                    }
                    let resp = self
                        .client
                        .get(url)
                        .bearer_auth(&token)
                        .header("Accept", "application/json")
                        .query(&query)
                        .send()
                        .await?;
                    let item: ItemContent = check_response(resp).await?.json().await?;
                    Ok(item.content)
                }
            })
            .await
    }
}
