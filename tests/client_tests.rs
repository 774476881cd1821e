mod auth_support;

use std::sync::Arc;

use chrono::Utc;
use docport::auth::{AccessTokenService, OAuthToken};
use docport::cli_session::{CliSession, CliSessionStore, KeyValueCliSessionStore};
use docport::client::{AzureDevOpsClient, CliGraphQLClient, CliSessionTokens, ClientError, GitHubClient};
use docport::kv::MemoryKeyValueStore;
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_support::{
    refreshable, service, CountingDataSource, CountingRefresher, CountingRepository,
};

async fn tokens(refresher: Arc<CountingRefresher>) -> (Arc<CountingRepository>, AccessTokenService) {
    let repository = CountingRepository::with_token(refreshable("stale")).await;
    let tokens = service(
        repository.clone(),
        CountingDataSource::new(refreshable("unused")),
        refresher,
    );
    (repository, tokens)
}

fn github(server: &MockServer, tokens: AccessTokenService) -> GitHubClient {
    GitHubClient::new(Arc::new(tokens)).with_api_base_url(server.uri())
}

fn repos_body() -> serde_json::Value {
    json!([{ "full_name": "octo/docs", "name": "docs", "private": true, "default_branch": "main" }])
}

#[tokio::test]
async fn successful_call_makes_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repos_body()))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = CountingRefresher::new(refreshable("fresh"));
    let (_, tokens) = tokens(refresher.clone()).await;
    let repositories = github(&server, tokens).list_repositories().await.unwrap();

    assert_eq!(repositories[0].full_name, "octo/docs");
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn expired_token_is_refreshed_and_call_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repos_body()))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = CountingRefresher::new(refreshable("fresh"));
    let (repository, tokens) = tokens(refresher.clone()).await;
    let repositories = github(&server, tokens).list_repositories().await.unwrap();

    assert_eq!(repositories.len(), 1);
    assert_eq!(refresher.calls(), 1);
    assert_eq!(repository.stored().await, Some(refreshable("fresh")));
}

#[tokio::test]
async fn second_auth_failure_propagates_after_two_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
        .expect(2)
        .mount(&server)
        .await;

    let refresher = CountingRefresher::new(refreshable("fresh"));
    let (_, tokens) = tokens(refresher.clone()).await;
    let err = github(&server, tokens).list_repositories().await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn server_error_never_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/docs/contents/openapi.yaml"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = CountingRefresher::new(refreshable("fresh"));
    let (_, tokens) = tokens(refresher.clone()).await;
    let err = github(&server, tokens)
        .get_file_content("octo", "docs", "openapi.yaml", None)
        .await
        .unwrap_err();

    match err {
        ClientError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn file_content_is_fetched_raw_at_ref() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/docs/contents/api/openapi.yaml"))
        .and(query_param("ref", "v2"))
        .and(header("accept", "application/vnd.github.raw+json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("openapi: 3.1.0"))
        .expect(1)
        .mount(&server)
        .await;

    let (_, tokens) = tokens(CountingRefresher::new(refreshable("fresh"))).await;
    let content = github(&server, tokens)
        .get_file_content("octo", "docs", "/api/openapi.yaml", Some("v2"))
        .await
        .unwrap();

    assert_eq!(content, "openapi: 3.1.0");
    let requests = server.received_requests().await.unwrap();
    let accept: Vec<&str> = requests[0]
        .headers
        .get_all("accept")
        .iter()
        .map(|value| value.to_str().unwrap())
        .collect();
    assert_eq!(accept, vec!["application/vnd.github.raw+json"]);
}

#[tokio::test]
async fn graphql_errors_are_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Field 'nope' doesn't exist" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_, tokens) = tokens(CountingRefresher::new(refreshable("fresh"))).await;
    let err = github(&server, tokens)
        .graphql("{ nope }", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::GraphQl(message) if message.contains("nope")));
}

fn azure(server: &MockServer, tokens: AccessTokenService) -> AzureDevOpsClient {
    AzureDevOpsClient::new("contoso", Arc::new(tokens)).with_base_url(server.uri())
}

#[tokio::test]
async fn azure_sign_in_redirect_triggers_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/web/_apis/git/repositories"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "location",
            "https://spsprodweu5.vssps.visualstudio.com/_signin?realm=dev.azure.com",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/web/_apis/git/repositories"))
        .and(header("authorization", "Bearer fresh"))
        .and(query_param("api-version", "7.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "value": [{ "id": "r1", "name": "api", "defaultBranch": "refs/heads/main" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = CountingRefresher::new(refreshable("fresh"));
    let (_, tokens) = tokens(refresher.clone()).await;
    let repositories = azure(&server, tokens).list_repositories("web").await.unwrap();

    assert_eq!(repositories[0].name, "api");
    assert_eq!(repositories[0].default_branch.as_deref(), Some("refs/heads/main"));
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn azure_ordinary_redirect_is_not_followed_or_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/web/_apis/git/repositories"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "https://dev.azure.com/elsewhere"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let refresher = CountingRefresher::new(refreshable("fresh"));
    let (_, tokens) = tokens(refresher.clone()).await;
    let err = azure(&server, tokens).list_repositories("web").await.unwrap_err();

    match err {
        ClientError::Redirect { status, location } => {
            assert_eq!(status, 302);
            assert_eq!(location, "https://dev.azure.com/elsewhere");
        }
        other => panic!("expected Redirect, got {other:?}"),
    }
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn azure_file_content_reads_item_at_branch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/web/_apis/git/repositories/api/items"))
        .and(query_param("path", "openapi.json"))
        .and(query_param("versionDescriptor.version", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "/openapi.json",
            "content": "{\"openapi\":\"3.0.0\"}"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_, tokens) = tokens(CountingRefresher::new(refreshable("fresh"))).await;
    let content = azure(&server, tokens)
        .get_file_content("web", "api", "openapi.json", Some("main"))
        .await
        .unwrap();

    assert_eq!(content, "{\"openapi\":\"3.0.0\"}");
}

fn cli_session(token: OAuthToken) -> CliSession {
    CliSession::new(Uuid::new_v4(), token)
}

fn cli_client(
    server: &MockServer,
    session: CliSession,
    store: Arc<KeyValueCliSessionStore>,
    refresher: Arc<CountingRefresher>,
) -> (Arc<CliSessionTokens>, CliGraphQLClient) {
    let tokens = Arc::new(CliSessionTokens::new(session, store, refresher));
    let client = CliGraphQLClient::new(tokens.clone(), format!("{}/graphql", server.uri()));
    (tokens, client)
}

#[tokio::test]
async fn cli_session_without_refresh_token_rethrows_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = CountingRefresher::new(refreshable("fresh"));
    let store = Arc::new(KeyValueCliSessionStore::new(Arc::new(MemoryKeyValueStore::new())));
    let (_, client) = cli_client(
        &server,
        cli_session(OAuthToken::non_refreshable("stale")),
        store,
        refresher.clone(),
    );

    let err = client.list_repositories().await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn cli_refresh_updates_and_persists_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repositories": [{ "fullName": "octo/docs" }, { "fullName": "octo/api" }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = CountingRefresher::new(OAuthToken::new("fresh", Some("r2".to_string())));
    let store = Arc::new(KeyValueCliSessionStore::new(Arc::new(MemoryKeyValueStore::new())));
    let session = cli_session(OAuthToken::new("stale", Some("r1".to_string())))
        .with_expires_at(Utc::now() - chrono::Duration::minutes(5));
    let session_id = session.session_id;
    let (tokens, client) = cli_client(&server, session, store.clone(), refresher.clone());

    let repositories = client.list_repositories().await.unwrap();

    assert_eq!(repositories, vec!["octo/docs", "octo/api"]);
    assert_eq!(refresher.calls(), 1);
    let current = tokens.session().await;
    assert_eq!(current.access_token, "fresh");
    assert_eq!(current.refresh_token.as_deref(), Some("r2"));
    assert!(!current.is_expired());
    assert_eq!(store.get(&session_id).await.unwrap(), Some(current));
}
