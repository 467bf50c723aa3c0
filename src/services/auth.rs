//! Account and session management
//!
//! Sign-up creates the account and its profile, then opens a session.
//! Sessions are opaque random tokens that expire after a configured number
//! of days; an expired token is deleted the first time it is presented.

use crate::db::repositories::{ProfileRepository, SessionRepository, UserRepository};
use crate::models::{Profile, Session, SignInInput, SignUpInput, User};
use crate::services::password::{hash_password, verify_password};
use crate::services::ServiceError;
use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

/// Default session lifetime in days
pub const DEFAULT_SESSION_DAYS: i64 = 7;

const MIN_PASSWORD_LEN: usize = 6;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.]{3,30}$").expect("valid username pattern"));

/// Validate a username: 3-30 letters, digits, `_` or `.`
pub fn validate_username(username: &str) -> Result<(), ServiceError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(ServiceError::Validation(
            "Username must be 3-30 characters of letters, numbers, '_' or '.'".to_string(),
        ))
    }
}

pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    session_days: i64,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            profile_repo,
            session_days: DEFAULT_SESSION_DAYS,
        }
    }

    pub fn with_session_days(mut self, days: i64) -> Self {
        self.session_days = days;
        self
    }

    /// Register an account with its profile and sign it in.
    pub async fn sign_up(&self, input: SignUpInput) -> Result<Session, ServiceError> {
        let email = normalize_email(&input.email);
        let username = input.username.trim().to_string();

        if !email.contains('@') || email.len() < 3 {
            return Err(ServiceError::Validation("A valid email is required".to_string()));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        validate_username(&username)?;

        if self.user_repo.get_by_email(&email).await?.is_some() {
            return Err(ServiceError::Validation(format!(
                "Email '{}' is already registered",
                email
            )));
        }
        if self.profile_repo.get_by_username(&username).await?.is_some() {
            return Err(ServiceError::Validation(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: hash_password(&input.password)?,
            created_at: now,
        };
        let full_name = input
            .full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id: user.id,
            username,
            full_name,
            avatar_url: None,
            bio: None,
            created_at: now,
            updated_at: now,
        };
        self.user_repo.create_with_profile(&user, &profile).await?;

        tracing::info!(user_id = %user.id, "account created");
        self.create_session(user.id).await
    }

    pub async fn sign_in(&self, input: SignInInput) -> Result<Session, ServiceError> {
        let invalid = || ServiceError::Unauthenticated("Invalid email or password".to_string());

        let user = self
            .user_repo
            .get_by_email(&normalize_email(&input.email))
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "sign-in rejected");
            return Err(invalid());
        }

        self.create_session(user.id).await
    }

    pub async fn sign_out(&self, token: &str) -> Result<(), ServiceError> {
        self.session_repo.delete(token).await?;
        Ok(())
    }

    /// The user behind a live session token.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, ServiceError> {
        let session = match self.session_repo.get_by_id(token).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {}", e);
            }
            return Ok(None);
        }

        Ok(self.user_repo.get_by_id(session.user_id).await?)
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, ServiceError> {
        Ok(self.session_repo.delete_expired().await?)
    }

    async fn create_session(&self, user_id: Uuid) -> Result<Session, ServiceError> {
        let now = Utc::now();
        let session = Session {
            id: generate_token(),
            user_id,
            expires_at: now + Duration::days(self.session_days),
            created_at: now,
        };
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(session)
    }
}

/// Emails are stored and matched lowercased.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 64 hex characters of randomness
fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
