use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use finchat::agent::Agent;
use finchat::context::Context;
use finchat::models::message::Turn;
use finchat::providers::openai::OpenAiProvider;
use finchat::tools::finance;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Serialize)]
struct ChatRequest {
    session_id: String,
    message: String,
    /// Extra binding values for this request, e.g. `{"year": 2024}`
    #[serde(default)]
    context: Map<String, Value>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ChatResponse {
    answer: String,
    table_preview: Option<Vec<Map<String, Value>>>,
    followups: Vec<String>,
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServerError> {
    if request.session_id.trim().is_empty() {
        return Err(ServerError::BadRequest("session_id is required".to_string()));
    }
    if request.message.trim().is_empty() {
        return Err(ServerError::BadRequest("message is required".to_string()));
    }

    // One agent per request; only the session store is shared
    let provider = OpenAiProvider::new(state.provider_config.clone())?;
    let registry = finance::registry(state.gateway.clone());
    let agent = Agent::new(Box::new(provider), registry, state.agent_config.clone());

    let mut turns = state.sessions.history(&request.session_id).await;
    turns.push(Turn::user(request.message.clone()));
    let context = Context::from_map(request.context);

    let envelope = agent
        .run(&turns, &context)
        .await
        .map_err(anyhow::Error::from)?;

    state
        .sessions
        .append(
            &request.session_id,
            vec![
                Turn::user(request.message),
                Turn::assistant(envelope.answer.clone()),
            ],
        )
        .await;

    Ok(Json(ChatResponse {
        answer: envelope.answer,
        table_preview: envelope.table_preview,
        followups: envelope.followups,
    }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}
