//! Relay server for family documents.
//!
//! The server stores one opaque JSON document per family group and relays
//! every write to the devices subscribed to that family. It never inspects
//! or merges documents; devices resolve conflicts themselves.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check (no auth required)
//! - `POST /auth/anonymous`: Issues a bearer token for a new anonymous user
//! - `GET /families/{id}`: Current document (auth required)
//! - `PUT /families/{id}`: Replaces the document and notifies subscribers (auth required)
//! - `GET /families/{id}/subscribe?token=...`: WebSocket; sends the current
//!   document on open (`null` if none is stored) and every later one, as
//!   JSON text frames

pub mod hub;
pub mod sessions;
pub mod storage;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower_http::trace::TraceLayer;
use wealthsync_core::remote::{AuthResponse, HealthResponse, AUTH_PATH, HEALTH_PATH};

pub use hub::FamilyHub;
pub use sessions::{Session, SessionStore};
pub use storage::{FamilyStorage, FamilyStorageError};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<RwLock<FamilyStorage>>,
    pub hub: Arc<FamilyHub>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    /// Creates state storing documents under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage: Arc::new(RwLock::new(FamilyStorage::new(data_dir))),
            hub: Arc::new(FamilyHub::new()),
            sessions: Arc::new(SessionStore::default()),
        }
    }
}

/// Builds the server's router.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth). The subscription authenticates through its
    // query string because browsers cannot set headers on WebSockets.
    let public_routes = Router::new()
        .route(HEALTH_PATH, get(health))
        .route(AUTH_PATH, post(sign_in))
        .route("/families/{family_id}/subscribe", get(subscribe));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/families/{family_id}", get(get_family).put(put_family))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Errors
// ============================================================================

/// Error response body
#[derive(Serialize)]
struct ApiError {
    error: &'static str,
    message: String,
}

fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiError {
            error,
            message: message.into(),
        }),
    )
        .into_response()
}

fn storage_error_response(e: FamilyStorageError) -> Response {
    match e {
        FamilyStorageError::InvalidFamilyId(id) => error_response(
            StatusCode::BAD_REQUEST,
            "invalid_family",
            format!("Invalid family ID: {}", id),
        ),
        e => {
            tracing::error!("Storage failure: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Failed to access family document",
            )
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Authentication middleware
async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        Some(_) => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_auth",
                "Authorization header must use Bearer scheme",
            );
        }
        None => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "missing_auth",
                "Authorization header required",
            );
        }
    };

    match state.sessions.validate(token) {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            "Unknown or expired token",
        ),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Anonymous sign-in
async fn sign_in(State(state): State<AppState>) -> Json<AuthResponse> {
    let (token, session) = state.sessions.issue();
    tracing::info!("Signed in anonymous user {}", session.user_id);
    Json(AuthResponse {
        token,
        user_id: session.user_id,
    })
}

async fn get_family(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> Response {
    let storage = state.storage.read().await;
    match storage.load(&family_id) {
        Ok(Some(doc)) => Json(doc).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            "No document stored for this family",
        ),
        Err(e) => storage_error_response(e),
    }
}

async fn put_family(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Extension(session): Extension<Session>,
    Json(doc): Json<Value>,
) -> Response {
    if !doc.is_object() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_document",
            "Document must be a JSON object",
        );
    }

    // Held across the broadcast so subscribers see writes in storage order.
    let storage = state.storage.write().await;
    if let Err(e) = storage.save(&family_id, &doc) {
        return storage_error_response(e);
    }
    let reached = state.hub.broadcast(&family_id, doc).await;

    tracing::debug!(
        "Stored document for {} from {} ({} subscriber(s) notified)",
        family_id,
        session.user_id,
        reached
    );

    StatusCode::NO_CONTENT.into_response()
}

/// Subscription query parameters
#[derive(Debug, Deserialize)]
struct SubscribeParams {
    token: Option<String>,
}

async fn subscribe(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Query(params): Query<SubscribeParams>,
) -> Response {
    let Some(session) = params
        .token
        .as_deref()
        .and_then(|token| state.sessions.validate(token))
    else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            "Unknown or expired token",
        );
    };

    if let Err(e) = FamilyStorage::validate_family_id(&family_id) {
        return storage_error_response(e);
    }

    ws.on_upgrade(move |socket| relay(socket, state, family_id, session.user_id))
}

/// Streams a family's documents to one WebSocket until either side closes.
async fn relay(mut socket: WebSocket, state: AppState, family_id: String, user_id: String) {
    // Subscribing under the read lock means no write can land between the
    // snapshot and the first broadcast we receive.
    let (mut updates, current) = {
        let storage = state.storage.read().await;
        let updates = state.hub.subscribe(&family_id).await;
        (updates, storage.load(&family_id))
    };

    tracing::debug!("{} subscribed to {}", user_id, family_id);

    stream_updates(&mut socket, &state, &family_id, updates, current).await;
    state.hub.release(&family_id).await;

    tracing::debug!("{} unsubscribed from {}", user_id, family_id);
}

/// Sends `current` and then every update until the socket or channel closes.
async fn stream_updates(
    socket: &mut WebSocket,
    state: &AppState,
    family_id: &str,
    mut updates: broadcast::Receiver<Value>,
    current: Result<Option<Value>, FamilyStorageError>,
) {
    let current = match current {
        Ok(doc) => doc.unwrap_or(Value::Null),
        Err(e) => {
            tracing::warn!("Failed to load {} for subscriber: {}", family_id, e);
            return;
        }
    };
    if send_document(socket, &current).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(doc) => {
                    if send_document(socket, &doc).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Only the latest version matters.
                    tracing::debug!("Subscriber to {} skipped {} update(s)", family_id, skipped);
                    let latest = state.storage.read().await.load(family_id);
                    if let Ok(Some(doc)) = latest {
                        if send_document(socket, &doc).await.is_err() {
                            return;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_document(socket: &mut WebSocket, doc: &Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(doc.to_string().into())).await
}
