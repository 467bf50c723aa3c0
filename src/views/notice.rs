//! Transient user-facing notices
//!
//! Every failed operation ends up here. Nothing is retried.

use serde::Serialize;

use crate::services::ServiceError;
use crate::views::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
    /// Navigate here after showing the notice
    #[serde(skip)]
    pub redirect: Option<Route>,
}

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: description.into(),
            redirect: None,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: description.into(),
            redirect: None,
        }
    }

    pub fn redirect_to(mut self, route: Route) -> Self {
        self.redirect = Some(route);
        self
    }

    /// Notice for a failed `action`. Internal failures are logged and shown
    /// generically.
    pub fn from_error(action: &str, err: &ServiceError) -> Self {
        match err {
            ServiceError::Unauthenticated(msg) => Self::error("Authentication required", msg.clone()),
            ServiceError::AccessDenied(msg) => {
                tracing::warn!(action, reason = %msg, "action rejected by access policy");
                Self::error("Access denied", msg.clone())
            }
            ServiceError::NotFound(what) => Self::error(format!("{} not found", what), err.to_string()),
            ServiceError::Validation(msg) => Self::error(action.to_string(), msg.clone()),
            ServiceError::Storage(e) => {
                tracing::warn!(action, error = %e, "upload failed");
                Self::error(action.to_string(), err.to_string())
            }
            ServiceError::Internal(e) => {
                tracing::error!(action, error = ?e, "operation failed");
                Self::error(action.to_string(), GENERIC_FAILURE)
            }
        }
    }
}
