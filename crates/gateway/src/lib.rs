//! HTTP API gateway for Nimbus.
//!
//! Exposes the three inbound operations the core supports:
//! - `POST /chat`   — submit an utterance, receive an SSE event stream
//! - `POST /clear`  — reset a session's conversation
//! - `GET  /health` — liveness check
//!
//! Built on Axum. The gateway holds no conversation state of its own;
//! sessions live in the injected `SessionStore` and all turn logic is
//! the agent's.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use nimbus_agent::{ChatAgent, ToolExecutor};
use nimbus_core::event::EventBus;
use nimbus_core::message::SessionKey;
use nimbus_core::session::SessionStore;
use nimbus_session::InMemorySessionStore;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Arc<ChatAgent>,
    pub sessions: Arc<dyn SessionStore>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/clear", post(clear_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: nimbus_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = nimbus_providers::build_from_config(&config);
    let registry = Arc::new(nimbus_tools::default_registry(&config.cloud));
    let event_bus = Arc::new(EventBus::default());
    let executor = Arc::new(ToolExecutor::new(registry, event_bus.clone()));
    let agent = Arc::new(ChatAgent::from_config(
        provider, executor, event_bus, &config,
    ));
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());

    let state = Arc::new(GatewayState { agent, sessions });
    let app = build_router(state);

    info!(addr = %addr, model = %config.llm.model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_key: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// `POST /chat` — submit an utterance, stream the turn's events back.
///
/// A fresh session key is generated when the request carries none; the
/// key is always echoed in the `X-Session-Key` response header so the
/// client can continue the conversation.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    if payload.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "No message provided".into(),
            }),
        ));
    }

    let key = match &payload.session_key {
        Some(k) => SessionKey::from(k),
        None => SessionKey::generate(),
    };

    info!(session = %key, message_len = payload.message.len(), "chat request");

    let session = state.sessions.open(&key).await;
    let rx = state.agent.run_turn(session, payload.message.as_str());

    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok::<_, Infallible>(SseEvent::default().event(event.event_type()).data(data))
    });

    Ok((
        [("x-session-key", key.to_string())],
        Sse::new(stream),
    ))
}

#[derive(Deserialize)]
struct ClearRequest {
    session_key: String,
}

#[derive(Serialize)]
struct ClearResponse {
    status: &'static str,
    message: &'static str,
}

/// `POST /clear` — reset the session's conversation to empty.
async fn clear_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ClearRequest>,
) -> Result<Json<ClearResponse>, (StatusCode, Json<ErrorResponse>)> {
    let key = SessionKey::from(&payload.session_key);
    info!(session = %key, "clear request");

    state.sessions.clear(&key).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    Ok(Json(ClearResponse {
        status: "success",
        message: "Conversation cleared",
    }))
}
