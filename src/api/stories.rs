//! Story endpoints
//!
//! - GET /api/v1/stories
//! - GET /api/v1/stories/{user_id}
//! - POST /api/v1/stories (multipart: `file`)

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState, Viewer};
use crate::api::upload::read_form;
use crate::models::StoryGroup;
use crate::services::AuthorStories;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stories", get(story_bar).post(create_story))
        .route("/stories/{user_id}", get(author_stories))
}

async fn story_bar(State(state): State<AppState>) -> Result<Json<Vec<StoryGroup>>, ApiError> {
    Ok(Json(state.stories.story_bar(Utc::now()).await?))
}

async fn author_stories(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AuthorStories>, ApiError> {
    Ok(Json(state.stories.author_stories(user_id, Utc::now()).await?))
}

async fn create_story(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(multipart, "file").await?;
    let media = form
        .file
        .ok_or_else(|| ApiError::validation_error("Please choose an image or video for your story"))?;
    let story = state.stories.create_story(viewer, media).await?;
    Ok((StatusCode::CREATED, Json(story)))
}
