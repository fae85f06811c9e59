//! HTTP handler for the customer-facing recommendation chatbot.

use crate::{
    AppState,
    api::models::chat::{ChatRequest, ChatResponse},
    errors::{Error, Result},
};
use axum::{Json, extract::State};

#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    summary = "Ask for a recommendation",
    description = "Send `conversation_id` from a previous reply to continue that conversation. \
                   Conversations are forgotten after a period of inactivity.",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply with the menu items it drew on", body = ChatResponse),
        (status = 400, description = "Empty or overlong message"),
        (status = 500, description = "Model API or database error"),
        (status = 503, description = "Chat is not enabled"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Result<Json<ChatResponse>> {
    let chat = state.chat.as_ref().ok_or_else(|| Error::ServiceUnavailable {
        message: "Chat is not enabled".to_string(),
    })?;

    let response = chat.respond(&state.db, request).await?;
    Ok(Json(response))
}
