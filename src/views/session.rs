//! Client auth state
//!
//! The current session lives in a `watch` channel so every view can observe
//! sign-in and sign-out as they happen.

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::models::{SignInInput, SignUpInput};
use crate::services::AuthService;
use crate::views::{Notice, Route};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn { user_id: Uuid, token: String },
}

impl AuthState {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::SignedIn { user_id, .. } => Some(*user_id),
            Self::SignedOut => None,
        }
    }
}

pub struct SessionStore {
    auth: Arc<AuthService>,
    state: watch::Sender<AuthState>,
}

impl SessionStore {
    pub fn new(auth: Arc<AuthService>) -> Self {
        let (state, _) = watch::channel(AuthState::SignedOut);
        Self { auth, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.state.borrow().user_id()
    }

    /// Apply the session gate to a navigation target.
    pub fn navigate(&self, route: Route) -> Route {
        route.gate(self.user_id().is_some())
    }

    /// Pick up a stored token if it still names a live session.
    pub async fn restore(&self, token: &str) -> AuthState {
        let state = match self.auth.validate_session(token).await {
            Ok(Some(user)) => AuthState::SignedIn {
                user_id: user.id,
                token: token.to_string(),
            },
            Ok(None) => AuthState::SignedOut,
            Err(e) => {
                tracing::warn!(error = %e, "session restore failed");
                AuthState::SignedOut
            }
        };
        self.state.send_replace(state.clone());
        state
    }

    pub async fn sign_up(&self, input: SignUpInput) -> Result<Notice, Notice> {
        let session = self
            .auth
            .sign_up(input)
            .await
            .map_err(|e| Notice::from_error("Sign up failed", &e))?;
        self.state.send_replace(AuthState::SignedIn {
            user_id: session.user_id,
            token: session.id,
        });
        Ok(Notice::success("Welcome!", "Your account has been created").redirect_to(Route::Feed))
    }

    pub async fn sign_in(&self, input: SignInInput) -> Result<Notice, Notice> {
        let session = self
            .auth
            .sign_in(input)
            .await
            .map_err(|e| Notice::from_error("Sign in failed", &e))?;
        self.state.send_replace(AuthState::SignedIn {
            user_id: session.user_id,
            token: session.id,
        });
        Ok(Notice::success("Welcome back!", "You have signed in").redirect_to(Route::Feed))
    }

    /// Local state is cleared even when the store call fails.
    pub async fn sign_out(&self) -> Notice {
        let previous = self.state.send_replace(AuthState::SignedOut);
        if let AuthState::SignedIn { token, .. } = previous {
            if let Err(e) = self.auth.sign_out(&token).await {
                tracing::warn!(error = %e, "sign-out did not reach the store");
            }
        }
        Notice::success("Signed out", "See you soon").redirect_to(Route::Landing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use crate::db::repositories::{SqlxProfileRepository, SqlxSessionRepository, SqlxUserRepository};

    async fn store() -> SessionStore {
        let pool = setup_pool().await;
        let auth = AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxProfileRepository::boxed(pool),
        );
        SessionStore::new(Arc::new(auth))
    }

    #[tokio::test]
    async fn test_sign_up_notifies_watchers_and_opens_gate() {
        let store = store().await;
        let mut rx = store.subscribe();
        assert_eq!(store.navigate(Route::Feed), Route::Auth);

        let notice = store
            .sign_up(SignUpInput {
                email: "w@example.com".into(),
                password: "secret123".into(),
                username: "watcher".into(),
                full_name: None,
            })
            .await
            .unwrap();
        assert_eq!(notice.redirect, Some(Route::Feed));

        rx.changed().await.unwrap();
        assert!(rx.borrow().user_id().is_some());
        assert_eq!(store.navigate(Route::Landing), Route::Feed);

        let token = match store.current() {
            AuthState::SignedIn { token, .. } => token,
            AuthState::SignedOut => panic!("not signed in"),
        };
        store.sign_out().await;
        assert_eq!(store.current(), AuthState::SignedOut);
        assert_eq!(store.restore(&token).await, AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_failed_sign_in_stays_signed_out() {
        let store = store().await;
        let notice = store
            .sign_in(SignInInput {
                email: "ghost@example.com".into(),
                password: "whatever".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(notice.description, "Invalid email or password");
        assert_eq!(store.current(), AuthState::SignedOut);
    }
}
