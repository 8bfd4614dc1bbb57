use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use crate::chat::ChatService;
use crate::memory::{FactRecord, FactStore};
use crate::runtime::BackendRuntime;

pub const SESSION_COOKIE: &str = "stan_sid";

#[derive(Clone)]
pub struct ServerState {
    pub chat: Arc<ChatService>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    reply: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FactsResponse {
    user_id: String,
    facts: Vec<FactRecord>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/facts/:user_id", get(list_facts))
        .with_state(state)
}

pub async fn serve(runtime: BackendRuntime) -> Result<()> {
    let bind_addr = runtime
        .config
        .bind_addr
        .parse::<SocketAddr>()
        .context("Invalid bind address (expected host:port)")?;

    let state = Arc::new(ServerState {
        chat: runtime.chat.clone(),
    });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind server to {}", bind_addr))?;
    tracing::info!("Stan listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn chat(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body =
        body.map_err(|rejection| error_response(rejection.status(), &rejection.body_text()))?;
    let body = parse_chat_request(&body)?;
    let message = body
        .message
        .as_deref()
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Message is required"))?;

    let (user_id, new_session) = resolve_user(body.user_id.as_deref(), &headers);
    tracing::debug!(
        "Chat message from user {} ({} chars)",
        user_id,
        message.chars().count()
    );

    let reply = state
        .chat
        .respond(&user_id, message)
        .await
        .map_err(internal_error)?;

    let mut response = Json(ChatResponse { reply }).into_response();
    if new_session {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, user_id
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    Ok(response)
}

async fn list_facts(
    State(state): State<Arc<ServerState>>,
    Path(user_id): Path<String>,
) -> Result<Json<FactsResponse>, ApiError> {
    let facts = state
        .chat
        .store()
        .list_records(&user_id)
        .map_err(internal_error)?;
    Ok(Json(FactsResponse { user_id, facts }))
}

/// Decode the chat body without requiring a JSON content type. An empty body is an
/// empty request so it gets the same 400 as a missing `message`.
fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ChatRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        let status = match e.classify() {
            Category::Data => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        };
        error_response(status, &format!("Invalid request body: {}", e))
    })
}

/// Pick the caller's identity: explicit `userId`, else the session cookie, else a
/// fresh session id. The flag is true when a new session id was minted.
fn resolve_user(explicit: Option<&str>, headers: &HeaderMap) -> (String, bool) {
    if let Some(user_id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
        return (user_id.to_string(), false);
    }
    if let Some(session_id) = session_from_cookies(headers) {
        return (session_id, false);
    }
    (uuid::Uuid::new_v4().to_string(), true)
}

fn session_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

fn error_response(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

fn internal_error(error: anyhow::Error) -> ApiError {
    tracing::error!("Request failed: {:#}", error);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string())
}
