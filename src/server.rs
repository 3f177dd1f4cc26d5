use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::logging::{LogEntry, LogLevel, SharedLogger};
use crate::relay::{self, UpstreamClient};
use crate::translate::chat_types::{ChatRequest, ErrorDetail};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub upstream: Arc<UpstreamClient>,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ChatRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            state
                .logger
                .warn("server", format!("Failed to parse request: {}", e));
            let err = ErrorDetail::new(format!("Invalid request body: {}", e));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    if let Err(e) = req.validate() {
        state.logger.warn("server", format!("Rejected request: {}", e));
        let detail = match e {
            RelayError::InvalidRequest { message } => message,
            other => other.to_string(),
        };
        return (StatusCode::BAD_REQUEST, Json(ErrorDetail::new(detail))).into_response();
    }

    let thinking = req.thinking_enabled(state.config.chat.enable_thinking);
    let request_id = Uuid::new_v4();

    state.logger.log(
        LogEntry::new(
            LogLevel::Info,
            "server",
            format!(
                "Request: messages={} thinking={} (requested={:?})",
                req.messages.len(),
                thinking,
                req.enable_thinking
            ),
        )
        .for_request(request_id),
    );

    let frames = relay::stream_chat(
        state.upstream.clone(),
        req.messages,
        thinking,
        state.logger.clone(),
        request_id,
    );

    let event_stream = frames.map(|frame| -> std::result::Result<Event, Infallible> {
        Ok(Event::default().data(frame.data()))
    });

    Sse::new(event_stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "chat relay is running",
    }))
}
