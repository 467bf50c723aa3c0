//! Conversation and message endpoints
//!
//! - GET /api/v1/conversations
//! - POST /api/v1/conversations/resolve/{user_id}
//! - GET | POST /api/v1/conversations/{id}/messages
//! - POST /api/v1/conversations/{id}/read
//! - GET /api/v1/conversations/{id}/stream (server-sent events)

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState, Viewer};
use crate::models::{Conversation, ConversationSummary, Message};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations/resolve/{user_id}", post(resolve_conversation))
        .route("/conversations/{id}/messages", get(list_messages).post(send_message))
        .route("/conversations/{id}/read", post(mark_read))
        .route("/conversations/{id}/stream", get(stream))
}

async fn list_conversations(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    Ok(Json(state.messaging.list_conversations(viewer).await?))
}

async fn resolve_conversation(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(state.messaging.resolve_conversation(viewer, user_id).await?))
}

async fn list_messages(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.messaging.messages(viewer, id).await?))
}

/// Blank content sends nothing and answers 204.
async fn send_message(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<axum::response::Response, ApiError> {
    match state.messaging.send(viewer, id, &body.content).await? {
        Some(message) => Ok((StatusCode::CREATED, Json(message)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn mark_read(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.messaging.mark_read(viewer, id).await?))
}

/// One `change` event per insert or update, data is the JSON change event.
async fn stream(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = state.messaging.subscribe(viewer, id).await?;
    tracing::debug!(channel = subscription.name(), "event stream opened");

    let events = subscription.into_stream().filter_map(|change| async move {
        match Event::default().event("change").json_data(&change) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!("Failed to encode change event: {}", e);
                None
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
