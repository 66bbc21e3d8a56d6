//! HTTP surface.
//!
//! ```text
//! POST /v1/chat/completions          chat.rs       one-shot JSON or SSE, ends with [DONE]
//! POST /v1/responses                 responses.rs  one-shot JSON or SSE, stored either way
//! GET  /v1/responses?limit=N         responses.rs  stored responses, oldest first
//! GET  /v1/responses/{response_id}   responses.rs
//! GET  /v1/models                    (here)
//! GET  /health                       (here)
//! ```
//!
//! Handlers stay thin: decode, ask the [`Engine`], encode (`wire.rs`). Injected
//! errors and malformed bodies leave through [`ApiError`].

#[path = "server/chat.rs"]
mod chat;
#[path = "server/responses.rs"]
mod responses;
#[path = "server/store.rs"]
mod store;
#[path = "server/wire.rs"]
mod wire;

pub use store::ResponseStore;

use crate::{Engine, InjectedError};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    engine: Engine,
    store: Arc<ResponseStore<responses::StoredResponse>>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        let store = ResponseStore::with_capacity(engine.config().history.max_responses);
        AppState { engine, store: Arc::new(store) }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.engine.config().server.cors.as_deref());

    Router::new()
        .route("/v1/chat/completions", post(chat::completions))
        .route("/v1/responses", post(responses::create).get(responses::list))
        .route("/v1/responses/{response_id}", get(responses::retrieve))
        .route("/v1/models", get(models))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// `*` (or unset) allows any origin.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match origin.map(str::trim).filter(|o| !o.is_empty() && *o != "*") {
        None => layer.allow_origin(Any),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => layer.allow_origin(value),
            Err(err) => {
                tracing::warn!(origin, error = %err, "invalid CORS origin, allowing any");
                layer.allow_origin(Any)
            }
        },
    }
}

async fn models(State(state): State<AppState>) -> Json<wire::List<wire::ModelEntry>> {
    let models = state.engine.config().models_or_default();
    Json(wire::List::new(models.into_iter().map(wire::ModelEntry::from).collect()))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
        "apis": {
            "chat_completions": "available",
            "responses": "available",
            "models": "available",
        },
    }))
}

// --- Errors ---------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("response not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Injected(#[from] InjectedError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_json", self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            ApiError::Injected(InjectedError(payload)) => {
                let status = StatusCode::from_u16(payload.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, payload.code.as_str(), payload.message.clone())
            }
        };

        let body = wire::ErrorEnvelope {
            error: wire::ErrorBody { message: &message, code, kind: wire::error_type(status.as_u16()) },
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server failed: {0}")]
    Serve(#[from] std::io::Error),
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(engine: Engine, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener.local_addr().unwrap_or(addr);

    tracing::info!(
        %addr,
        rules = engine.config().rules.len(),
        streaming = engine.config().streaming_enabled(),
        "mock server listening"
    );

    axum::serve(listener, router(AppState::new(engine))).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
