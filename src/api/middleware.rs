//! API middleware and shared handler plumbing
//!
//! - Session token extraction (bearer header or `session` cookie)
//! - Required and optional authentication
//! - `ApiError`, the JSON error body, and its mapping from `ServiceError`

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::db::repositories::{
    SqlxCommentRepository, SqlxConversationRepository, SqlxFollowRepository, SqlxLikeRepository,
    SqlxMessageRepository, SqlxPostRepository, SqlxProfileRepository, SqlxSessionRepository,
    SqlxStoryRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::realtime::ChangeFeed;
use crate::services::{
    AuthService, FeedService, LikeService, MessagingService, PostService, ProfileService, SearchService,
    ServiceError, StoryService,
};
use crate::storage::{ObjectStorage, StorageError};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub feed: Arc<FeedService>,
    pub likes: Arc<LikeService>,
    pub posts: Arc<PostService>,
    pub stories: Arc<StoryService>,
    pub profiles: Arc<ProfileService>,
    pub messaging: Arc<MessagingService>,
    pub search: Arc<SearchService>,
    pub session_days: i64,
}

impl AppState {
    /// Wire repositories and services over one pool and change feed.
    pub fn build(pool: DynDatabasePool, changes: ChangeFeed, storage: Arc<ObjectStorage>, config: &Config) -> Self {
        let users = SqlxUserRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let profiles = SqlxProfileRepository::boxed(pool.clone());
        let posts = SqlxPostRepository::boxed(pool.clone());
        let stories = SqlxStoryRepository::boxed(pool.clone());
        let likes = SqlxLikeRepository::boxed(pool.clone());
        let comments = SqlxCommentRepository::boxed(pool.clone());
        let follows = SqlxFollowRepository::boxed(pool.clone());
        let conversations = SqlxConversationRepository::boxed(pool.clone(), changes.clone());
        let messages = SqlxMessageRepository::boxed(pool, changes.clone());

        let feed = Arc::new(FeedService::new(
            posts.clone(),
            profiles.clone(),
            likes.clone(),
            comments.clone(),
        ));

        Self {
            auth: Arc::new(
                AuthService::new(users, sessions, profiles.clone()).with_session_days(config.auth.session_days),
            ),
            likes: Arc::new(LikeService::new(likes.clone())),
            posts: Arc::new(PostService::new(
                posts,
                profiles.clone(),
                likes,
                comments,
                storage.clone(),
            )),
            stories: Arc::new(
                StoryService::new(stories, profiles.clone(), storage.clone())
                    .with_ttl_hours(config.stories.ttl_hours),
            ),
            profiles: Arc::new(ProfileService::new(
                profiles.clone(),
                follows.clone(),
                feed.clone(),
                storage,
            )),
            messaging: Arc::new(MessagingService::new(
                conversations,
                messages,
                follows,
                profiles.clone(),
                changes,
            )),
            search: Arc::new(SearchService::new(profiles).with_limit(config.search.limit)),
            feed,
            session_days: config.auth.session_days,
        }
    }
}

/// Signed-in user, required. Rejects with 401 when absent.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Signed-in user id if there is one
#[derive(Debug, Clone, Copy)]
pub struct Viewer(pub Option<Uuid>);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthenticated(msg) => Self::unauthorized(msg),
            ServiceError::AccessDenied(msg) => Self::forbidden(msg),
            ServiceError::NotFound(_) => Self::not_found(err.to_string()),
            ServiceError::Validation(msg) => Self::validation_error(msg),
            ServiceError::Storage(StorageError::TooLarge { .. }) => {
                Self::new("PAYLOAD_TOO_LARGE", err.to_string())
            }
            ServiceError::Storage(StorageError::Io(ref e)) => {
                tracing::error!("Storage write failed: {}", e);
                Self::internal_error("Failed to store upload")
            }
            ServiceError::Storage(_) => Self::validation_error(err.to_string()),
            ServiceError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                Self::internal_error("Internal server error")
            }
        }
    }
}

/// Extract session token from request headers
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .auth
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware. An invalid token is treated as
/// signed out.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.auth.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session lookup failed: {}", e),
        }
    }
    next.run(request).await
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(
            parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=xyz"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=xyz"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("xyz"));
        assert!(extract_session_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_service_error_status_codes() {
        let cases = [
            (ServiceError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::AccessDenied("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("Post"), StatusCode::NOT_FOUND),
            (ServiceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                ServiceError::Storage(StorageError::UnsupportedType("text/plain".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::Storage(StorageError::TooLarge { size: 2, limit: 1 }),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (ServiceError::Internal(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_error_hides_details() {
        let api = ApiError::from(ServiceError::Internal(anyhow::anyhow!("secret table name")));
        assert!(!api.error.message.contains("secret"));
    }
}
