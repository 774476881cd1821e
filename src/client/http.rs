//! Shared HTTP clients and response helpers.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::LOCATION;
use reqwest::redirect;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ClientError;

pub(crate) const USER_AGENT: &str = "docport";

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
static NO_REDIRECT_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(10)
        .user_agent(USER_AGENT)
}

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| builder().build().unwrap_or_default())
}

/// Client that surfaces redirects as responses instead of following them.
pub fn no_redirect_client() -> &'static reqwest::Client {
    NO_REDIRECT_CLIENT.get_or_init(|| {
        builder()
            .redirect(redirect::Policy::none())
            .build()
            .unwrap_or_default()
    })
}

/// Turns redirects and non-2xx statuses into [`ClientError`]s.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_redirection() {
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        return Err(ClientError::Redirect {
            status: status.as_u16(),
            location,
        });
    }
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp)
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: &'a Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

/// Posts one GraphQL operation with a bearer token.
///
/// A response carrying `errors` fails with [`ClientError::GraphQl`] even when
/// partial `data` is present.
pub async fn post_graphql<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    query: &str,
    variables: &Value,
) -> Result<T, ClientError> {
    let resp = client
        .post(url)
        .bearer_auth(token)
        .json(&GraphQlRequest { query, variables })
        .send()
        .await?;
    let payload: GraphQlResponse<T> = check_response(resp).await?.json().await?;
    if !payload.errors.is_empty() {
        let messages: Vec<_> = payload.errors.into_iter().map(|e| e.message).collect();
        return Err(ClientError::GraphQl(messages.join("; ")));
    }
    payload
        .data
        .ok_or_else(|| ClientError::Decode("GraphQL response has no data".to_string()))
}
