//! API layer - HTTP handlers and routing
//!
//! JSON endpoints under `/api/v1`:
//! - Auth: sign-up, sign-in, sign-out, session
//! - Feed, posts, comments and likes
//! - Stories
//! - Profiles, follows and search
//! - Conversations, messages and the live message stream
//!
//! Uploaded media is served from `/storage`.

pub mod auth;
pub mod messages;
pub mod middleware;
pub mod posts;
pub mod profiles;
pub mod stories;
pub mod upload;

use std::path::Path;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser, Viewer};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Session required
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Session optional; each service decides whether it needs a user
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(posts::router())
        .merge(stories::router())
        .merge(profiles::router())
        .merge(messages::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str, storage_root: &Path) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    // Cookie auth needs credentials, which rules out a wildcard origin
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    // Stored objects are user content; never let a browser sniff them into HTML
    let storage = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .service(ServeDir::new(storage_root));

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service("/storage", storage)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageConfig};
    use crate::db::{create_test_pool, migrations};
    use crate::realtime::ChangeFeed;
    use crate::storage::ObjectStorage;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app() -> (Router, TempDir) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage: StorageConfig {
                path: dir.path().to_path_buf(),
                ..StorageConfig::default()
            },
            ..Config::default()
        };
        let storage = Arc::new(ObjectStorage::new(&config.storage));
        storage.init().await.unwrap();
        let state = AppState::build(pool, ChangeFeed::default(), storage, &config);
        let router = build_router(state, &config.server.cors_origin, dir.path()).unwrap();
        (router, dir)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn sign_up(app: &Router, name: &str) -> (String, String) {
        let (status, body) = send(
            app,
            json_request(
                "POST",
                "/api/v1/auth/sign-up",
                None,
                json!({
                    "email": format!("{}@example.com", name),
                    "password": "secret123",
                    "username": name,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    const BOUNDARY: &str = "XBOUNDARY";

    fn file_upload(uri: &str, token: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut form = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: {t}\r\n\r\n",
            b = BOUNDARY,
            f = file_name,
            t = content_type
        )
        .into_bytes();
        form.extend_from_slice(bytes);
        form.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(form))
            .unwrap()
    }

    async fn follow_each_other(app: &Router, a: &(String, String), b: &(String, String)) {
        for (token, target) in [(&a.0, &b.1), (&b.0, &a.1)] {
            let uri = format!("/api/v1/users/{}/follow", target);
            let (status, _) = send(app, json_request("POST", &uri, Some(token), json!({}))).await;
            assert!(status.is_success());
        }
    }

    #[tokio::test]
    async fn test_session_requires_token() {
        let (app, _dir) = app().await;
        let (status, body) = send(&app, get("/api/v1/auth/session", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (token, id) = sign_up(&app, "sam").await;
        let (status, body) = send(&app, get("/api/v1/auth/session", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.as_str());
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_post_comment_and_like_flow() {
        let (app, _dir) = app().await;
        let (token, _) = sign_up(&app, "poster").await;

        let boundary = "XBOUNDARY";
        let form = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"content\"\r\n\r\nhello world\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/posts")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(form))
            .unwrap();
        let (status, post) = send(&app, request).await;
        assert_eq!(status, StatusCode::CREATED, "{}", post);
        let post_id = post["id"].as_str().unwrap().to_string();

        let (status, detail) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/posts/{}/comments", post_id),
                Some(&token),
                json!({"content": "first!"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(detail["comments"][0]["content"], "first!");
        assert_eq!(detail["comments"][0]["author"]["username"], "poster");

        let like_uri = format!("/api/v1/posts/{}/like", post_id);
        let (_, likes) = send(&app, json_request("POST", &like_uri, Some(&token), json!({}))).await;
        assert_eq!(likes, json!({"count": 1, "is_liked": true}));
        let (_, likes) = send(&app, json_request("DELETE", &like_uri, Some(&token), json!({}))).await;
        assert_eq!(likes, json!({"count": 0, "is_liked": false}));

        let (status, feed) = send(&app, get("/api/v1/feed", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feed[0]["content"], "hello world");
        assert_eq!(feed[0]["comment_count"], 1);
    }

    #[tokio::test]
    async fn test_like_without_session_is_unauthorized() {
        let (app, _dir) = app().await;
        let uri = format!("/api/v1/posts/{}/like", uuid::Uuid::new_v4());
        let (status, body) = send(&app, json_request("POST", &uri, None, json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "You must be logged in to like posts");
    }

    #[tokio::test]
    async fn test_resolve_conversation_requires_mutual_follow() {
        let (app, _dir) = app().await;
        let (x_token, x_id) = sign_up(&app, "xena").await;
        let (y_token, y_id) = sign_up(&app, "yuri").await;

        let follow = |token: String, target: String| {
            json_request("POST", &format!("/api/v1/users/{}/follow", target), Some(&token), json!({}))
        };
        send(&app, follow(x_token.clone(), y_id.clone())).await;

        let resolve = format!("/api/v1/conversations/resolve/{}", y_id);
        let (status, body) = send(&app, json_request("POST", &resolve, Some(&x_token), json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        send(&app, follow(y_token.clone(), x_id.clone())).await;
        let (status, conversation) = send(&app, json_request("POST", &resolve, Some(&x_token), json!({}))).await;
        assert_eq!(status, StatusCode::OK);

        let back = format!("/api/v1/conversations/resolve/{}", x_id);
        let (_, same) = send(&app, json_request("POST", &back, Some(&y_token), json!({}))).await;
        assert_eq!(conversation["id"], same["id"]);

        let messages = format!("/api/v1/conversations/{}/messages", same["id"].as_str().unwrap());
        let (status, _) = send(&app, json_request("POST", &messages, Some(&y_token), json!({"content": "  "}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, sent) = send(&app, json_request("POST", &messages, Some(&y_token), json!({"content": "hi"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent["content"], "hi");
    }

    #[tokio::test]
    async fn test_search_with_blank_and_missing_terms() {
        let (app, _dir) = app().await;
        sign_up(&app, "findme").await;

        let (_, hits) = send(&app, get("/api/v1/search?q=FIND", None)).await;
        assert_eq!(hits.as_array().unwrap().len(), 1);
        let (status, none) = send(&app, get("/api/v1/search?q=zzz", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(none, json!([]));
        let (_, blank) = send(&app, get("/api/v1/search", None)).await;
        assert_eq!(blank, json!([]));
    }

    #[tokio::test]
    async fn test_unknown_post_is_not_found() {
        let (app, _dir) = app().await;
        let (status, body) = send(&app, get(&format!("/api/v1/posts/{}", uuid::Uuid::new_v4()), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_story_upload_appears_in_story_bar() {
        let (app, _dir) = app().await;
        let (token, id) = sign_up(&app, "storyteller").await;

        let request = file_upload("/api/v1/stories", &token, "beach.mp4", "video/mp4", b"frames");
        let (status, story) = send(&app, request).await;
        assert_eq!(status, StatusCode::CREATED, "{}", story);
        assert_eq!(story["media_type"], "video");
        let media_url = story["media_url"].as_str().unwrap();
        assert!(media_url.starts_with(&format!("/storage/posts/stories/{}/{}-", id, id)));
        assert!(media_url.ends_with(".mp4"));

        let (status, bar) = send(&app, get("/api/v1/stories", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bar[0]["user_id"], id.as_str());
        assert_eq!(bar[0]["stories"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_story_upload_without_file_is_rejected() {
        let (app, _dir) = app().await;
        let (token, _) = sign_up(&app, "nofile").await;

        let (status, body) = send(&app, file_upload("/api/v1/stories", &token, "empty.png", "image/png", b"")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_avatar_extension_comes_from_content_type() {
        let (app, _dir) = app().await;
        let (token, _) = sign_up(&app, "avatar").await;

        let request = file_upload("/api/v1/profile/avatar", &token, "avatar.html", "image/png", b"<script>");
        let (status, profile) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK, "{}", profile);
        let avatar_url = profile["avatar_url"].as_str().unwrap().to_string();
        assert!(avatar_url.ends_with("/avatar.png"), "{}", avatar_url);

        let response = app.clone().oneshot(get(&avatar_url, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_svg_avatar_is_rejected() {
        let (app, dir) = app().await;
        let (token, id) = sign_up(&app, "vector").await;

        let request = file_upload("/api/v1/profile/avatar", &token, "logo.svg", "image/svg+xml", b"<svg/>");
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(!dir.path().join("avatars").join(&id).exists());
    }

    #[tokio::test]
    async fn test_message_stream_emits_change_events() {
        let (app, _dir) = app().await;
        let xena = sign_up(&app, "xena").await;
        let yuri = sign_up(&app, "yuri").await;
        follow_each_other(&app, &xena, &yuri).await;

        let resolve = format!("/api/v1/conversations/resolve/{}", yuri.1);
        let (_, conversation) = send(&app, json_request("POST", &resolve, Some(&xena.0), json!({}))).await;
        let conversation_id = conversation["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/conversations/{}/stream", conversation_id), Some(&yuri.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        let mut events = response.into_body().into_data_stream();

        let messages = format!("/api/v1/conversations/{}/messages", conversation_id);
        let (status, _) = send(&app, json_request("POST", &messages, Some(&xena.0), json!({"content": "hello"}))).await;
        assert_eq!(status, StatusCode::CREATED);

        let chunk = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .expect("event before timeout")
            .expect("stream open")
            .unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.starts_with("event: change\n"), "{}", text);

        let data = text
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .expect("data line");
        let change: Value = serde_json::from_str(data).unwrap();
        assert_eq!(change["kind"], "INSERT");
        assert_eq!(change["table"], "messages");
        assert_eq!(change["record"]["content"], "hello");
        assert_eq!(change["record"]["conversation_id"], conversation_id.as_str());
    }

    #[tokio::test]
    async fn test_message_stream_requires_participant() {
        let (app, _dir) = app().await;
        let xena = sign_up(&app, "xena").await;
        let yuri = sign_up(&app, "yuri").await;
        let (outsider, _) = sign_up(&app, "zoe").await;
        follow_each_other(&app, &xena, &yuri).await;

        let resolve = format!("/api/v1/conversations/resolve/{}", yuri.1);
        let (_, conversation) = send(&app, json_request("POST", &resolve, Some(&xena.0), json!({}))).await;
        let uri = format!("/api/v1/conversations/{}/stream", conversation["id"].as_str().unwrap());

        let (status, _) = send(&app, get(&uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, get(&uri, Some(&outsider))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
