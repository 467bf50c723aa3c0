//! Feed, post and like endpoints
//!
//! - GET /api/v1/feed
//! - POST /api/v1/posts (multipart: `content`, optional `file`)
//! - GET /api/v1/posts/{post_id}
//! - POST /api/v1/posts/{post_id}/comments
//! - POST | DELETE /api/v1/posts/{post_id}/like

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState, Viewer};
use crate::api::upload::read_form;
use crate::models::{FeedItem, LikeSummary};
use crate::services::PostDetail;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feed", get(feed))
        .route("/posts", post(create_post))
        .route("/posts/{post_id}", get(post_detail))
        .route("/posts/{post_id}/comments", post(add_comment))
        .route("/posts/{post_id}/like", post(like).delete(unlike))
}

async fn feed(State(state): State<AppState>, Viewer(viewer): Viewer) -> Result<Json<Vec<FeedItem>>, ApiError> {
    Ok(Json(state.feed.feed(viewer).await?))
}

async fn create_post(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(multipart, "file").await?;
    let post = state
        .posts
        .create_post(viewer, form.text("content"), form.file)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn post_detail(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostDetail>, ApiError> {
    Ok(Json(state.posts.detail(post_id, viewer).await?))
}

/// Returns the reloaded detail so the new comment shows last.
async fn add_comment(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(post_id): Path<Uuid>,
    Json(body): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.posts.add_comment(viewer, post_id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn like(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(post_id): Path<Uuid>,
) -> Result<Json<LikeSummary>, ApiError> {
    state.likes.like(viewer, post_id).await?;
    Ok(Json(state.likes.summary(post_id, viewer).await?))
}

async fn unlike(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(post_id): Path<Uuid>,
) -> Result<Json<LikeSummary>, ApiError> {
    state.likes.unlike(viewer, post_id).await?;
    Ok(Json(state.likes.summary(post_id, viewer).await?))
}
