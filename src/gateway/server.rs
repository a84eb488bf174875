use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::auth;
use crate::chat::ChatService;
use crate::config::DedConfig;
use crate::types::{Mood, ReplySource};

pub struct AppState {
    pub token: Option<String>,
    pub chat: ChatService,
}

pub async fn run(config: DedConfig, token: Option<String>) -> anyhow::Result<()> {
    let is_loopback = config.gateway.bind == "127.0.0.1"
        || config.gateway.bind == "::1"
        || config.gateway.bind == "localhost";

    if !is_loopback && token.is_none() {
        anyhow::bail!(
            "Auth token required when binding to non-loopback address. \
             Set --token or DEDKOLYA_TOKEN env var."
        );
    }

    let chat = ChatService::from_config(&config).await?;
    info!(models = ?chat.generator().router().models(), "chat service ready");

    let addr = format!("{}:{}", config.gateway.bind, config.gateway.port);
    let app = app(Arc::new(AppState { token, chat }));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("dedkolya gateway listening on {addr}");
    if is_loopback {
        info!("bound to loopback, local access only");
    } else {
        warn!("bound to {addr}, ensure auth token is set");
    }

    axum::serve(listener, app).await?;
    Ok(())
}

/// All routes. `/health` stays open; everything else goes through bearer auth.
pub fn app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/chat", post(chat))
        .route("/remember", post(remember))
        .route("/teach", post(teach))
        .route("/users/{user_id}/mood", get(mood))
        .route("/status", get(status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn default_user() -> String {
    "default".into()
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default = "default_user")]
    pub user_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub mood: Mood,
    pub source: ReplySource,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    #[serde(default = "default_user")]
    pub user_id: String,
    #[serde(default)]
    pub fact: String,
}

#[derive(Debug, Deserialize)]
pub struct TeachRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub fact: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

fn internal_error(e: anyhow::Error) -> Response {
    warn!("request failed: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Курва, что-то сломалось" })),
    )
        .into_response()
}

fn text_response(response: String) -> Response {
    Json(serde_json::json!({ "response": response })).into_response()
}

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    if req.message.trim().is_empty() {
        return bad_request("Пустое сообщение");
    }

    let reply = state.chat.handle(&req.user_id, &req.message).await;
    Json(ChatResponse {
        response: reply.reply,
        mood: reply.mood,
        source: reply.source,
        model: reply.model_used,
    })
    .into_response()
}

async fn remember(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RememberRequest>,
) -> Response {
    if req.fact.trim().is_empty() {
        return bad_request("Напиши факт после команды, курва! Например: /remember Я люблю рыбалку");
    }

    match state.chat.remember(&req.user_id, &req.fact).await {
        Ok(response) => text_response(response),
        Err(e) => internal_error(e),
    }
}

async fn teach(State(state): State<Arc<AppState>>, Json(req): Json<TeachRequest>) -> Response {
    if req.topic.trim().is_empty() || req.fact.trim().is_empty() {
        return bad_request("Формат: /teach тема факт");
    }

    match state.chat.teach(&req.topic, &req.fact).await {
        Ok(response) => text_response(response),
        Err(e) => internal_error(e),
    }
}

async fn mood(Path(user_id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.chat.current_mood(&user_id).await {
        Ok(mood) => Json(serde_json::json!({ "user_id": user_id, "mood": mood })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let router = state.chat.generator().router();
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "models": router.models(),
        "last_model": router.last_model(),
    }))
}
