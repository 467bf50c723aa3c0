//! Client routes and the session gate

use std::fmt;

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Auth,
    Feed,
    /// Own profile editor
    Profile,
    /// Own profile as others see it
    ProfileView,
    Search,
    CreatePost,
    CreateStory,
    Post(Uuid),
    User(Uuid),
    /// Optional deep link to a conversation with `user`
    Messages { user: Option<Uuid> },
    NotFound(String),
}

impl Route {
    /// Parse a path with an optional query string. Anything unrecognised,
    /// including malformed ids, is `NotFound`.
    pub fn parse(path: &str) -> Self {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').skip(1).collect();

        match segments.as_slice() {
            [] | [""] => Self::Landing,
            ["auth"] => Self::Auth,
            ["feed"] => Self::Feed,
            ["profile"] => Self::Profile,
            ["profile-view"] => Self::ProfileView,
            ["search"] => Self::Search,
            ["create-post"] => Self::CreatePost,
            ["create-story"] => Self::CreateStory,
            ["post", id] => id.parse().map(Self::Post).unwrap_or_else(|_| Self::not_found(path)),
            ["user", id] => id.parse().map(Self::User).unwrap_or_else(|_| Self::not_found(path)),
            ["messages"] => Self::Messages {
                user: query.and_then(query_user),
            },
            _ => Self::not_found(path),
        }
    }

    fn not_found(path: &str) -> Self {
        Self::NotFound(path.to_string())
    }

    pub fn to_path(&self) -> String {
        match self {
            Self::Landing => "/".to_string(),
            Self::Auth => "/auth".to_string(),
            Self::Feed => "/feed".to_string(),
            Self::Profile => "/profile".to_string(),
            Self::ProfileView => "/profile-view".to_string(),
            Self::Search => "/search".to_string(),
            Self::CreatePost => "/create-post".to_string(),
            Self::CreateStory => "/create-story".to_string(),
            Self::Post(id) => format!("/post/{}", id),
            Self::User(id) => format!("/user/{}", id),
            Self::Messages { user: Some(id) } => format!("/messages?user={}", id),
            Self::Messages { user: None } => "/messages".to_string(),
            Self::NotFound(path) => path.clone(),
        }
    }

    /// Pages that send a signed-out visitor to the auth page
    pub fn requires_session(&self) -> bool {
        matches!(self, Self::Feed | Self::Profile | Self::ProfileView | Self::Search)
    }

    /// Where navigation actually lands given the session state.
    pub fn gate(self, signed_in: bool) -> Self {
        match self {
            route if route.requires_session() && !signed_in => Self::Auth,
            Self::Landing if signed_in => Self::Feed,
            route => route,
        }
    }
}

fn query_user(query: &str) -> Option<Uuid> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "user")
        .and_then(|(_, value)| value.parse().ok())
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}
