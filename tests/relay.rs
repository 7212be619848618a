//! End-to-end tests against a relay server bound to a loopback port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use wealthsync::{router, AppState};
use wealthsync_core::{
    Document, DocumentUpdate, GroupKey, LiveStore, MemoryPersistence, RemoteConfig, RemoteStore,
    SyncEngine, SyncStatus, SyncTiming,
};

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    _data_dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let data_dir = TempDir::new().unwrap();
        let state = AppState::new(data_dir.path());
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            state,
            _data_dir: data_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn ws_url(&self, family: &str, token: &str) -> String {
        format!(
            "ws://{}/families/{}/subscribe?token={}",
            self.addr, family, token
        )
    }

    async fn sign_in(&self) -> String {
        let auth: Value = reqwest::Client::new()
            .post(self.url("/auth/anonymous"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        auth["token"].as_str().unwrap().to_string()
    }

    async fn put(&self, family: &str, token: &str, doc: &Value) -> reqwest::StatusCode {
        reqwest::Client::new()
            .put(self.url(&format!("/families/{}", family)))
            .bearer_auth(token)
            .json(doc)
            .send()
            .await
            .unwrap()
            .status()
    }
}

/// Polls `check` until it holds or five seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn next_text(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

fn fast_timing() -> SyncTiming {
    SyncTiming {
        debounce: Duration::from_millis(50),
        ui_timeout: Duration::from_millis(500),
    }
}

#[tokio::test]
async fn test_health_and_anonymous_sign_in() {
    let server = TestServer::start().await;

    let health: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let token1 = server.sign_in().await;
    let token2 = server.sign_in().await;
    assert_ne!(token1, token2);
}

#[tokio::test]
async fn test_family_routes_require_auth() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let missing = client
        .put(server.url("/families/ABCD-1234"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::UNAUTHORIZED);

    let status = server.put("ABCD-1234", "bogus", &json!({})).await;
    assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_put_then_get_roundtrip() {
    let server = TestServer::start().await;
    let token = server.sign_in().await;
    let client = reqwest::Client::new();
    let doc = json!({ "lastUpdated": 7, "monthlyContribution": 100.0 });

    let unknown = client
        .get(server.url("/families/ABCD-1234"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);

    assert!(server.put("ABCD-1234", &token, &doc).await.is_success());

    let stored: Value = client
        .get(server.url("/families/ABCD-1234"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored, doc);
}

#[tokio::test]
async fn test_put_rejects_bad_input() {
    let server = TestServer::start().await;
    let token = server.sign_in().await;

    let status = server.put("ABCD-1234", &token, &json!([1, 2, 3])).await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);

    let status = server.put("bad.family", &token, &json!({})).await;
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subscription_sends_current_then_updates() {
    let server = TestServer::start().await;
    let token = server.sign_in().await;
    server
        .put("ABCD-1234", &token, &json!({ "lastUpdated": 1 }))
        .await;

    let (mut ws, _) = connect_async(server.ws_url("ABCD-1234", &token))
        .await
        .unwrap();
    assert_eq!(next_text(&mut ws).await["lastUpdated"], 1);

    server
        .put("ABCD-1234", &token, &json!({ "lastUpdated": 2 }))
        .await;
    assert_eq!(next_text(&mut ws).await["lastUpdated"], 2);
}

#[tokio::test]
async fn test_subscription_to_empty_family_sends_null_and_releases_channel() {
    let server = TestServer::start().await;
    let token = server.sign_in().await;

    let (mut ws, _) = connect_async(server.ws_url("WXYZ-9876", &token))
        .await
        .unwrap();
    assert_eq!(next_text(&mut ws).await, Value::Null);
    assert_eq!(server.state.hub.family_count().await, 1);

    ws.close(None).await.unwrap();
    drop(ws);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while server.state.hub.family_count().await != 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "channel still open after the last subscriber left"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_live_store_signs_in_again_when_token_is_rejected() {
    let server = TestServer::start().await;
    let store = LiveStore::with_token(&server.url(""), "expired".to_string()).unwrap();
    let group = GroupKey::parse("ABCD-1234").unwrap();
    let mut doc = Document::default();
    doc.logical_clock = 42;

    store.push(&group, &doc).await.unwrap();
    assert_ne!(store.token(), "expired");

    let stored: Value = reqwest::Client::new()
        .get(server.url("/families/ABCD-1234"))
        .bearer_auth(server.sign_in().await)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["lastUpdated"], 42);

    let stale = LiveStore::with_token(&server.url(""), "expired".to_string()).unwrap();
    let mut subscription = stale.subscribe(&group).await.unwrap();
    let first = tokio::time::timeout(Duration::from_secs(5), subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first["lastUpdated"], 42);
}

#[tokio::test]
async fn test_subscription_rejects_unknown_token() {
    let server = TestServer::start().await;
    let result = connect_async(server.ws_url("ABCD-1234", "bogus")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_engines_converge_through_server() {
    let server = TestServer::start().await;
    let config = RemoteConfig::new(server.url(""));
    let alice = SyncEngine::new(
        Arc::new(MemoryPersistence::new()),
        config.clone(),
        fast_timing(),
    );
    let bob = SyncEngine::new(Arc::new(MemoryPersistence::new()), config, fast_timing());

    alice.mutate(DocumentUpdate::new().monthly_contribution(4_000.0));
    let key = alice.create_group().await;
    assert!(!alice.is_demo());
    eventually(|| alice.status() == SyncStatus::Saved).await;

    bob.join_group(&key.to_string().to_lowercase()).await.unwrap();
    eventually(|| bob.document().payload.monthly_contribution == 4_000.0).await;

    bob.mutate(DocumentUpdate::new().theme_color("rose"));
    eventually(|| alice.document().payload.theme_color == "rose").await;
    assert_eq!(alice.document(), bob.document());

    alice.dispose();
    bob.dispose();
}

#[tokio::test]
async fn test_unreachable_server_degrades_to_demo() {
    let engine = SyncEngine::new(
        Arc::new(MemoryPersistence::new()),
        RemoteConfig::new("http://127.0.0.1:9"),
        fast_timing(),
    );

    engine.create_group().await;
    assert!(engine.is_demo());

    engine.mutate(DocumentUpdate::new().monthly_contribution(1.0));
    eventually(|| engine.status() == SyncStatus::Saved).await;
    assert_eq!(engine.document().payload.monthly_contribution, 1.0);
}
