//! Profile, follow and search endpoints
//!
//! - GET | PUT /api/v1/profile
//! - POST /api/v1/profile/avatar (multipart: `file`)
//! - GET /api/v1/profile/view
//! - GET /api/v1/users/{user_id}
//! - POST | DELETE /api/v1/users/{user_id}/follow
//! - GET /api/v1/search?q=

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState, Viewer};
use crate::api::upload::read_form;
use crate::models::{FollowCounts, Profile, UpdateProfileInput};
use crate::services::{ProfileOverview, ProfilePage};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(my_profile).put(update_profile))
        .route("/profile/avatar", post(upload_avatar))
        .route("/profile/view", get(profile_view))
        .route("/users/{user_id}", get(user_profile))
        .route("/users/{user_id}/follow", post(follow).delete(unfollow))
        .route("/search", get(search))
}

async fn my_profile(State(state): State<AppState>, Viewer(viewer): Viewer) -> Result<Json<ProfileOverview>, ApiError> {
    Ok(Json(state.profiles.my_profile(viewer).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.profiles.update_profile(viewer, body).await?))
}

async fn upload_avatar(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    multipart: Multipart,
) -> Result<Json<Profile>, ApiError> {
    let form = read_form(multipart, "file").await?;
    let image = form
        .file
        .ok_or_else(|| ApiError::validation_error("No file provided"))?;
    Ok(Json(state.profiles.upload_avatar(viewer, image).await?))
}

async fn profile_view(State(state): State<AppState>, Viewer(viewer): Viewer) -> Result<Json<ProfilePage>, ApiError> {
    Ok(Json(state.profiles.profile_view(viewer).await?))
}

async fn user_profile(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ProfilePage>, ApiError> {
    Ok(Json(state.profiles.user_profile(user_id, viewer).await?))
}

async fn follow(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(user_id): Path<Uuid>,
) -> Result<Json<FollowCounts>, ApiError> {
    Ok(Json(state.profiles.follow(viewer, user_id).await?))
}

async fn unfollow(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(user_id): Path<Uuid>,
) -> Result<Json<FollowCounts>, ApiError> {
    Ok(Json(state.profiles.unfollow(viewer, user_id).await?))
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Result<Json<Vec<Profile>>, ApiError> {
    Ok(Json(state.search.search(&query.q).await?))
}
