//! Client for the relay server.
//!
//! Authentication is anonymous: one `POST /auth/anonymous` yields a bearer
//! token used for every later request. The server keeps tokens in memory
//! only, so a request rejected with `401` signs in again and is retried once. Writes are plain `PUT`s of the JSON
//! document; subscriptions are WebSocket connections on which the server sends
//! the stored document once and then every new version as a text frame.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::protocol::{family_path, subscribe_path, AuthResponse, AUTH_PATH};
use super::{RemoteStore, Subscription};
use crate::document::Document;
use crate::error::{SyncError, SyncResult};
use crate::group_key::GroupKey;

/// Timeout applied to every HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote store backed by a relay server.
#[derive(Debug, Clone)]
pub struct LiveStore {
    http: reqwest::Client,
    server_url: String,
    token: Arc<RwLock<String>>,
}

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

impl LiveStore {
    /// Signs in anonymously against `server_url`.
    pub async fn connect(server_url: &str) -> SyncResult<Self> {
        let store = Self::with_token(server_url, String::new())?;
        store.sign_in().await?;
        Ok(store)
    }

    /// Requests a fresh anonymous token and uses it from now on.
    async fn sign_in(&self) -> SyncResult<()> {
        let response = self
            .http
            .post(self.build_http_url(AUTH_PATH))
            .send()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::RemoteUnavailable(format!(
                "Sign-in returned status {}",
                response.status()
            )));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;

        *self.token.write().unwrap_or_else(PoisonError::into_inner) = auth.token;
        tracing::debug!("Signed in to {} as {}", self.server_url, auth.user_id);
        Ok(())
    }

    /// Creates a store that reuses an already issued token.
    pub fn with_token(server_url: &str, token: String) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            server_url: server_url.to_string(),
            token: Arc::new(RwLock::new(token)),
        })
    }

    /// Returns the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Returns the current bearer token.
    pub fn token(&self) -> String {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Builds the subscription URL for a group.
    fn build_ws_url(&self, group: &GroupKey) -> String {
        // Convert http(s) to ws(s) if needed
        let base_url = if self.server_url.starts_with("http://") {
            self.server_url.replacen("http://", "ws://", 1)
        } else if self.server_url.starts_with("https://") {
            self.server_url.replacen("https://", "wss://", 1)
        } else if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            format!("ws://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!(
            "{}{}?token={}",
            base_url.trim_end_matches('/'),
            subscribe_path(group.as_str()),
            self.token()
        )
    }

    /// Builds an HTTP URL for a given path.
    fn build_http_url(&self, path: &str) -> String {
        // Convert ws(s) to http(s) if needed
        let base_url = if self.server_url.starts_with("ws://") {
            self.server_url.replacen("ws://", "http://", 1)
        } else if self.server_url.starts_with("wss://") {
            self.server_url.replacen("wss://", "https://", 1)
        } else if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    async fn put_document(&self, url: &str, body: &Value) -> SyncResult<reqwest::Response> {
        self.http
            .put(url)
            .bearer_auth(self.token())
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::PushFailed(e.to_string()))
    }

    async fn open_socket(&self, group: &GroupKey) -> Result<Socket, WsError> {
        connect_async(self.build_ws_url(group).as_str())
            .await
            .map(|(ws, _)| ws)
    }
}

impl RemoteStore for LiveStore {
    fn push(&self, group: &GroupKey, doc: &Document) -> BoxFuture<'static, SyncResult<()>> {
        let store = self.clone();
        let url = self.build_http_url(&family_path(group.as_str()));
        let body = doc.to_value();

        async move {
            let mut response = store.put_document(&url, &body).await?;
            if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                tracing::info!("Relay rejected our token; signing in again");
                store.sign_in().await?;
                response = store.put_document(&url, &body).await?;
            }

            if !response.status().is_success() {
                return Err(SyncError::PushFailed(format!(
                    "Server returned status {}",
                    response.status()
                )));
            }
            Ok(())
        }
        .boxed()
    }

    fn subscribe(&self, group: &GroupKey) -> BoxFuture<'static, SyncResult<Subscription>> {
        let store = self.clone();
        let group = group.clone();

        async move {
            let mut ws = match store.open_socket(&group).await {
                Ok(ws) => ws,
                Err(WsError::Http(response)) if response.status() == 401 => {
                    tracing::info!("Relay rejected our token; signing in again");
                    store.sign_in().await?;
                    store
                        .open_socket(&group)
                        .await
                        .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?
                }
                Err(e) => return Err(SyncError::RemoteUnavailable(e.to_string())),
            };

            let (sender, receiver) = mpsc::unbounded_channel();
            let feeder = tokio::spawn(async move {
                while let Some(frame) = ws.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            match serde_json::from_str::<Value>(text.as_str()) {
                                Ok(value) => {
                                    if sender.send(value).is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!("Ignoring malformed frame for {}: {}", group, e)
                                }
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Subscription to {} failed: {}", group, e);
                            break;
                        }
                    }
                }
                tracing::debug!("Subscription to {} closed", group);
            });

            Ok(Subscription::with_feeder(receiver, feeder))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> LiveStore {
        LiveStore::with_token(url, "test-token".to_string()).unwrap()
    }

    fn group() -> GroupKey {
        GroupKey::parse("ABCD-1234").unwrap()
    }

    #[test]
    fn test_build_ws_url() {
        assert_eq!(
            store("ws://localhost:8080").build_ws_url(&group()),
            "ws://localhost:8080/families/ABCD-1234/subscribe?token=test-token"
        );
        assert_eq!(
            store("http://localhost:8080").build_ws_url(&group()),
            "ws://localhost:8080/families/ABCD-1234/subscribe?token=test-token"
        );
        assert_eq!(
            store("https://sync.example.com/").build_ws_url(&group()),
            "wss://sync.example.com/families/ABCD-1234/subscribe?token=test-token"
        );
        assert_eq!(
            store("localhost:8080").build_ws_url(&group()),
            "ws://localhost:8080/families/ABCD-1234/subscribe?token=test-token"
        );
    }

    #[test]
    fn test_build_http_url() {
        assert_eq!(
            store("http://localhost:8080").build_http_url("/health"),
            "http://localhost:8080/health"
        );
        assert_eq!(
            store("ws://localhost:8080").build_http_url("/health"),
            "http://localhost:8080/health"
        );
        assert_eq!(
            store("wss://sync.example.com").build_http_url(AUTH_PATH),
            "https://sync.example.com/auth/anonymous"
        );
        assert_eq!(
            store("localhost:8080").build_http_url("/families/X"),
            "http://localhost:8080/families/X"
        );
    }

    #[test]
    fn test_store_accessors() {
        let store = store("http://localhost:8080");
        assert_eq!(store.server_url(), "http://localhost:8080");
        assert_eq!(store.token(), "test-token");
        assert!(!store.is_demo());
    }

    #[tokio::test]
    async fn test_push_to_unreachable_server_is_push_failed() {
        let store = store("http://127.0.0.1:9");
        let result = store.push(&group(), &Document::default()).await;
        assert!(matches!(result, Err(SyncError::PushFailed(_))));
    }

    #[tokio::test]
    async fn test_subscribe_to_unreachable_server_fails() {
        let store = store("http://127.0.0.1:9");
        assert!(store.subscribe(&group()).await.is_err());
    }
}
