//! Authentication API endpoints
//!
//! - POST /api/v1/auth/sign-up
//! - POST /api/v1/auth/sign-in
//! - POST /api/v1/auth/sign-out
//! - GET /api/v1/auth/session

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::models::{Session, SignInInput, SignUpInput, User};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: String,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/sign-out", post(sign_out))
        .route("/session", get(current_session))
}

fn session_cookie(value: &str, max_age_secs: i64) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        value, max_age_secs
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| ApiError::internal_error(e.to_string()))?,
    );
    Ok(headers)
}

async fn session_response(
    state: &AppState,
    session: Session,
    status: StatusCode,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth
        .validate_session(&session.id)
        .await?
        .ok_or_else(|| ApiError::internal_error("Session validation failed"))?;
    let headers = session_cookie(&session.id, state.session_days * 24 * 60 * 60)?;

    Ok((
        status,
        headers,
        Json(AuthResponse {
            user,
            token: session.id,
            expires_at: session.expires_at.to_rfc3339(),
        }),
    ))
}

/// POST /api/v1/auth/sign-up - Create account and profile, then sign in
async fn sign_up(
    State(state): State<AppState>,
    Json(body): Json<SignUpInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth.sign_up(body).await?;
    session_response(&state, session, StatusCode::CREATED).await
}

/// POST /api/v1/auth/sign-in
async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth.sign_in(body).await?;
    session_response(&state, session, StatusCode::OK).await
}

/// POST /api/v1/auth/sign-out
async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.auth.sign_out(&token).await?;
    }
    Ok((StatusCode::NO_CONTENT, session_cookie("", 0)?))
}

/// GET /api/v1/auth/session - The signed-in user
async fn current_session(user: AuthenticatedUser) -> Json<User> {
    Json(user.0)
}
