use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use aliri_clock::{DurationSecs, UnixTime};
use druid::{
    dto::{LoginRequest, RegisterRequest},
    store::{InMemoryTokenStore, StoreKey, TokenStore, TokenStoreExt},
    AuthError, CredentialKind, DruidClient, Error, SessionLinks, Settings, UserSession,
};
use serde_json::{json, Value};
use wiremock::{
    matchers::{body_partial_json, body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const CLIENT_ID: &str = "my-app";
const ENTRY_POINT: &str = "my-app-entrypoint";

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn token_body(access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
        "expires_at": (now_secs() + 3600) * 1000,
    })
}

fn result_ok() -> Value {
    json!({ "status": 200 })
}

fn client_for(server: &MockServer) -> (DruidClient, Arc<InMemoryTokenStore>) {
    let settings = Settings::new(
        server.uri().parse().unwrap(),
        format!("{}/graph", server.uri()).parse().unwrap(),
        CLIENT_ID,
        "s3cr3t",
        ENTRY_POINT,
    )
    .with_language("fr");

    let store = Arc::new(InMemoryTokenStore::new(CLIENT_ID));
    let client = DruidClient::with_reqwest(settings, store.clone()).unwrap();
    (client, store)
}

async fn mount_client_token(server: &MockServer, access_token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn client_token_is_issued_once_and_reused() {
    let server = MockServer::start().await;
    mount_client_token(&server, "client-1", 1).await;

    Mock::given(method("GET"))
        .and(path(format!("/graph/activityid/v1/entrypoint/{ENTRY_POINT}")))
        .and(header("authorization", "Bearer client-1"))
        .and(header("from", ENTRY_POINT))
        .and(header("accept-language", "fr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": { "fields": [] },
            "result": result_ok(),
        })))
        .expect(2)
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);

    client.search_entrypoint().await.unwrap();
    let response = client.search_entrypoint().await.unwrap();

    assert_eq!(response.content, Some(json!({ "fields": [] })));
    let stored: Option<Value> = store.get(StoreKey::EntrypointSettings).unwrap();
    assert_eq!(stored.unwrap()["content"]["fields"], json!([]));
}

#[tokio::test]
async fn login_stores_the_session_and_profile() {
    let server = MockServer::start().await;
    mount_client_token(&server, "client-1", 1).await;

    Mock::given(method("POST"))
        .and(path("/graph/activityid/v1/user/access"))
        .and(header("authorization", "Bearer client-1"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "actor": { "id": CLIENT_ID, "objectType": "application" },
            "verb": "access",
            "object": { "password": "pw" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": {
                "user": { "objectId": "u-1" },
                "session_info": {
                    "access_token": "user-1",
                    "token_type": "Bearer",
                    "expires_in": 3600,
                    "expires_at": (now_secs() + 3600) * 1000,
                    "refresh_token": "r1",
                    "scope": "openid",
                },
            },
            "result": result_ok(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/graph/activityid/v1/user/me"))
        .and(header("authorization", "Bearer user-1"))
        .and(header("from", ENTRY_POINT))
        .and(header("from-origin", CLIENT_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": { "user": { "objectId": "u-1", "name": "Someone" } },
            "result": result_ok(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);

    client
        .login(&LoginRequest::with_password("someone@example.com", "pw"))
        .await
        .unwrap();

    let stored_user: Option<Value> = store.get(StoreKey::User).unwrap();
    assert_eq!(stored_user.unwrap()["objectId"], "u-1");

    let connected = client.is_user_connected().await.unwrap();
    let content = connected.content.unwrap();
    assert_eq!(content.user.unwrap()["name"], "Someone");

    let session = content.session_info.unwrap();
    assert_eq!(session.access_token().unwrap().as_str(), "user-1");
    assert_eq!(session.scope(), Some("openid"));
}

#[tokio::test]
async fn expired_session_is_refreshed_before_building_the_edit_link() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-2")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/graph/activityid/v1/user/me"))
        .and(header("authorization", "Bearer user-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": { "user": { "objectId": "u-1" } },
            "result": result_ok(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);
    let expired = UserSession::issued_at("user-1", DurationSecs(3600), UnixTime(now_secs() - 7200))
        .with_refresh_token("r1")
        .with_scope("openid")
        .with_links(SessionLinks {
            edit_account: Some("https://account.example.com/edit?token={access_token}".to_owned()),
        });
    store.set(StoreKey::UserSession, Some(&expired)).unwrap();

    let url = client.edit_user_url().await.unwrap();

    // base64("user-2")
    assert_eq!(
        url.as_str(),
        "https://account.example.com/edit?token=dXNlci0y"
    );

    let session: UserSession = store.get(StoreKey::UserSession).unwrap().unwrap();
    assert_eq!(session.access_token().unwrap().as_str(), "user-2");
    assert_eq!(session.refresh_token().unwrap().as_str(), "r1");
    assert_eq!(session.scope(), Some("openid"));
}

#[tokio::test]
async fn rejected_client_token_is_refreshed_and_the_call_retried_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("client-1")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("client-2")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graph/activityid/v1/user/create"))
        .and(header("authorization", "Bearer client-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graph/activityid/v1/user/create"))
        .and(header("authorization", "Bearer client-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": { "objectType": "user", "confirmed": false, "objectId": "u-9" },
            "result": result_ok(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    let request = RegisterRequest::new(
        Some("pw".to_owned()),
        json!({ "email": "someone@example.com" }).as_object().unwrap().clone(),
        serde_json::Map::new(),
        Vec::new(),
    );

    let response = client.register(&request).await.unwrap();

    assert_eq!(response.content.unwrap().object_id, "u-9");
    let current = client.client_tokens().current().unwrap().unwrap();
    assert_eq!(current.access_token().as_str(), "client-2");
}

#[tokio::test]
async fn client_token_rejected_twice_is_invalid() {
    let server = MockServer::start().await;
    mount_client_token(&server, "client-1", 2).await;

    Mock::given(method("POST"))
        .and(path("/graph/activityid/v1/notification/request"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);

    let err = client
        .password_reset_request("someone@example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::InvalidClientToken)));
}

#[tokio::test]
async fn password_reset_request_names_the_notification() {
    let server = MockServer::start().await;
    mount_client_token(&server, "client-1", 1).await;

    Mock::given(method("POST"))
        .and(path("/graph/activityid/v1/notification/request"))
        .and(body_partial_json(json!({
            "verb": "request",
            "object": {
                "objectType": "user",
                "ids": { "email": { "objectType": "user_id", "value": "someone@example.com" } },
            },
            "source": { "id": "mobile", "objectType": "device" },
            "context": { "notificationType": "reset_password" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": { "objectType": "notification", "displayName": "reset" },
            "result": result_ok(),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);

    let response = client
        .password_reset_request("someone@example.com")
        .await
        .unwrap();

    assert_eq!(
        response.content.unwrap().display_name.as_deref(),
        Some("reset")
    );
}

#[tokio::test]
async fn no_session_means_no_user_is_connected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);

    let err = client.is_user_connected().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Auth(AuthError::MissingCredential(CredentialKind::User))
    ));
}

#[tokio::test]
async fn backend_errors_carry_the_status() {
    let server = MockServer::start().await;
    mount_client_token(&server, "client-1", 1).await;

    Mock::given(method("POST"))
        .and(path("/graph/activityid/v1/user/access"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "result": { "status": 400, "errors": [{ "message": "bad credentials" }] },
        })))
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);

    let err = client
        .login(&LoginRequest::with_password("someone@example.com", "wrong"))
        .await
        .unwrap_err();

    match err {
        Error::Auth(err) => assert_eq!(err.status(), Some(400)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.load(StoreKey::UserSession).unwrap().is_none());
}

#[tokio::test]
async fn logout_forgets_every_record() {
    let server = MockServer::start().await;
    mount_client_token(&server, "client-1", 1).await;

    let (client, store) = client_for(&server);
    client.obtain_client_token().await.unwrap();
    store
        .set(
            StoreKey::UserSession,
            Some(&UserSession::issued_at("user-1", DurationSecs(60), UnixTime(now_secs()))),
        )
        .unwrap();

    client.logout().unwrap();

    for key in StoreKey::ALL {
        assert!(store.load(key).unwrap().is_none(), "{key} survived logout");
    }
}

fn expired_session(refresh_token: &str) -> UserSession {
    UserSession::issued_at("user-1", DurationSecs(3600), UnixTime(now_secs() - 7200))
        .with_refresh_token(refresh_token)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn logout_during_a_refresh_keeps_the_session_forgotten() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("user-2"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);
    store
        .set(StoreKey::UserSession, Some(&expired_session("r1")))
        .unwrap();

    let refreshing = tokio::spawn({
        let client = client.clone();
        async move { client.refresh_access_token().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.logout().unwrap();

    assert!(refreshing.await.unwrap().is_ok());
    assert!(store.load(StoreKey::UserSession).unwrap().is_none());
}

#[tracing_test::traced_test]
#[tokio::test]
async fn session_refresh_is_logged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-2")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/graph/activityid/v1/user/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": { "user": { "objectId": "u-1" } },
            "result": result_ok(),
        })))
        .mount(&server)
        .await;

    let (client, store) = client_for(&server);
    store
        .set(StoreKey::UserSession, Some(&expired_session("r1")))
        .unwrap();

    client.is_user_connected().await.unwrap();

    assert!(logs_contain("stored credential is no longer valid"));
    assert!(logs_contain("exchanging refresh token"));
    assert!(logs_contain("received new credential"));
}

#[test]
fn store_of_another_application_is_refused() {
    let settings = Settings::new(
        "https://auth.example.com".parse().unwrap(),
        "https://graph.example.com".parse().unwrap(),
        CLIENT_ID,
        "s3cr3t",
        ENTRY_POINT,
    );
    let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new("other-app"));

    let err = DruidClient::with_reqwest(settings, store).unwrap_err();

    assert!(matches!(err, Error::StoreAccountMismatch { .. }));
}
