use std::sync::Arc;

use docport::auth::{AuthError, OAuthToken};
use docport::cli_session::{
    CliSessionStore, DeviceFlowPoll, DeviceFlowService, GitHubDeviceAuthorizationProvider,
    KeyValueCliSessionStore,
};
use docport::kv::MemoryKeyValueStore;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVICE_CODE: &str = "device-123";

struct Harness {
    server: MockServer,
    store: Arc<KeyValueCliSessionStore>,
    service: DeviceFlowService,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let provider = GitHubDeviceAuthorizationProvider::new("client-id")
        .with_device_code_url(format!("{}/login/device/code", server.uri()))
        .with_access_token_url(format!("{}/login/oauth/access_token", server.uri()));
    let store = Arc::new(KeyValueCliSessionStore::new(Arc::new(MemoryKeyValueStore::new())));
    let service = DeviceFlowService::new(Arc::new(provider), store.clone());
    Harness {
        server,
        store,
        service,
    }
}

async fn mount_device_code(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login/device/code"))
        .and(header("accept", "application/json"))
        .and(body_string_contains("client_id=client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": DEVICE_CODE,
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://github.com/login/device",
            "expires_in": 900,
            "interval": 5
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_exchange(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(body_string_contains("device_code=device-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn initiate_registers_pending_session() {
    let h = harness().await;
    mount_device_code(&h.server).await;

    let grant = h.service.initiate_device_flow().await.unwrap();

    assert_eq!(grant.device_code, DEVICE_CODE);
    assert_eq!(grant.user_code, "ABCD-EFGH");
    assert_eq!(grant.verification_uri, "https://github.com/login/device");
    assert_eq!((grant.interval, grant.expires_in), (5, 900));
    assert!(h.store.get_pending_session(DEVICE_CODE).await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_device_code_polls_to_none_without_calling_provider() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.server)
        .await;

    assert_eq!(h.service.poll_for_token("never-issued").await.unwrap(), None);
    assert_eq!(
        h.service.poll_device_flow("never-issued").await.unwrap(),
        DeviceFlowPoll::Unknown
    );
}

#[tokio::test]
async fn pending_authorization_polls_to_none() {
    let h = harness().await;
    mount_device_code(&h.server).await;
    mount_exchange(&h.server, json!({ "error": "authorization_pending" })).await;

    h.service.initiate_device_flow().await.unwrap();

    assert_eq!(h.service.poll_for_token(DEVICE_CODE).await.unwrap(), None);
    assert!(h.store.get_pending_session(DEVICE_CODE).await.unwrap().is_some());
}

#[tokio::test]
async fn slow_down_polls_to_none() {
    let h = harness().await;
    mount_device_code(&h.server).await;
    mount_exchange(&h.server, json!({ "error": "slow_down", "interval": 10 })).await;

    h.service.initiate_device_flow().await.unwrap();

    assert_eq!(
        h.service.poll_device_flow(DEVICE_CODE).await.unwrap(),
        DeviceFlowPoll::SlowDown
    );
    assert_eq!(h.service.poll_for_token(DEVICE_CODE).await.unwrap(), None);
}

#[tokio::test]
async fn successful_exchange_completes_session() {
    let h = harness().await;
    mount_device_code(&h.server).await;
    mount_exchange(
        &h.server,
        json!({
            "access_token": "ghu_access",
            "refresh_token": "ghr_refresh",
            "expires_in": 28800,
            "token_type": "bearer"
        }),
    )
    .await;

    h.service.initiate_device_flow().await.unwrap();
    let pending_id = h.store.get_pending_session(DEVICE_CODE).await.unwrap().unwrap();

    let session = h.service.poll_for_token(DEVICE_CODE).await.unwrap().unwrap();

    assert_eq!(session.session_id, pending_id);
    assert_eq!(
        session.oauth_token(),
        OAuthToken::new("ghu_access", Some("ghr_refresh".to_string()))
    );
    assert!(session.expires_at.is_some());
    assert_eq!(h.store.get_pending_session(DEVICE_CODE).await.unwrap(), None);

    let stored = h
        .service
        .get_session_token(Some(&pending_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.oauth_token(), session.oauth_token());
}

#[tokio::test]
async fn completed_flow_is_unknown_afterwards() {
    let h = harness().await;
    mount_device_code(&h.server).await;
    mount_exchange(&h.server, json!({ "access_token": "ghu_access" })).await;

    h.service.initiate_device_flow().await.unwrap();
    assert!(h.service.poll_for_token(DEVICE_CODE).await.unwrap().is_some());

    assert_eq!(
        h.service.poll_device_flow(DEVICE_CODE).await.unwrap(),
        DeviceFlowPoll::Unknown
    );
}

#[tokio::test]
async fn other_provider_errors_propagate() {
    let h = harness().await;
    mount_device_code(&h.server).await;
    mount_exchange(&h.server, json!({ "error": "access_denied" })).await;

    h.service.initiate_device_flow().await.unwrap();
    let err = h.service.poll_for_token(DEVICE_CODE).await.unwrap_err();

    assert!(matches!(err, AuthError::Unauthorized(_)), "got {err:?}");
}

#[tokio::test]
async fn session_lookup_handles_missing_ids() {
    let h = harness().await;

    assert_eq!(h.service.get_session_token(None).await.unwrap(), None);
    assert_eq!(
        h.service
            .get_session_token(Some(&uuid::Uuid::new_v4()))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn sign_out_removes_session() {
    let h = harness().await;
    mount_device_code(&h.server).await;
    mount_exchange(&h.server, json!({ "access_token": "ghu_access" })).await;

    h.service.initiate_device_flow().await.unwrap();
    let session = h.service.poll_for_token(DEVICE_CODE).await.unwrap().unwrap();
    h.service.sign_out(&session.session_id).await.unwrap();

    assert_eq!(
        h.service
            .get_session_token(Some(&session.session_id))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn out_of_range_token_lifetime_completes_without_expiry() {
    let h = harness().await;
    mount_device_code(&h.server).await;
    mount_exchange(
        &h.server,
        json!({ "access_token": "ghu_access", "expires_in": 100_000_000_000_000_000u64 }),
    )
    .await;

    h.service.initiate_device_flow().await.unwrap();
    let session = h.service.poll_for_token(DEVICE_CODE).await.unwrap().unwrap();

    assert_eq!(session.access_token, "ghu_access");
    assert_eq!(session.expires_at, None);
    assert!(!session.is_expired());
}

#[tokio::test]
async fn out_of_range_device_code_lifetime_still_registers_pending() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/login/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": DEVICE_CODE,
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://github.com/login/device",
            "expires_in": u64::MAX,
            "interval": 5
        })))
        .mount(&h.server)
        .await;

    let grant = h.service.initiate_device_flow().await.unwrap();

    assert_eq!(grant.expires_in, u64::MAX);
    assert!(h.store.get_pending_session(DEVICE_CODE).await.unwrap().is_some());
}
