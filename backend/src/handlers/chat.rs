//! Advisor chat handlers

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{ChatMessage, Limit};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::chat::{ChatExchange, SendMessageInput, HISTORY_DEFAULT, HISTORY_MAX};
use crate::services::ChatService;
use crate::AppState;

fn chat_service(state: &AppState) -> ChatService {
    ChatService::new(
        state.db.clone(),
        state.events.clone(),
        state.gemini.clone(),
        &state.config.advisor,
    )
}

/// Send a chat message and get the advisor's reply
pub async fn send_message(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SendMessageInput>,
) -> AppResult<Json<ChatExchange>> {
    let exchange = chat_service(&state)
        .send_message(current_user.id(), input)
        .await?;
    Ok(Json(exchange))
}

/// Conversation history, oldest first
pub async fn chat_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(limit): Query<Limit>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    let messages = chat_service(&state)
        .history(current_user.id(), limit.resolve(HISTORY_DEFAULT, HISTORY_MAX))
        .await?;
    Ok(Json(messages))
}

/// Delete the conversation
pub async fn clear_chat_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let deleted = chat_service(&state).clear_history(current_user.id()).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
