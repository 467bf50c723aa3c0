//! Error type shared by the feature services.

use crate::db::is_policy_violation;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The action needs a signed-in user
    #[error("{0}")]
    Unauthenticated(String),

    /// An access policy rejected the action
    #[error("{0}")]
    AccessDenied(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("Upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Map a store error, turning a policy rejection into `AccessDenied`.
    pub fn from_store(err: anyhow::Error, denied: &str) -> Self {
        if is_policy_violation(&err) {
            Self::AccessDenied(denied.to_string())
        } else {
            Self::Internal(err)
        }
    }
}

/// The acting user, or `Unauthenticated` with `message`.
pub fn require_user(actor: Option<uuid::Uuid>, message: &str) -> Result<uuid::Uuid, ServiceError> {
    actor.ok_or_else(|| ServiceError::Unauthenticated(message.to_string()))
}
