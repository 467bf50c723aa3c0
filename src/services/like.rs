//! Like toggling

use std::sync::Arc;

use uuid::Uuid;

use crate::db::repositories::LikeRepository;
use crate::models::LikeSummary;
use crate::services::error::require_user;
use crate::services::ServiceError;

pub const LOGIN_TO_LIKE: &str = "You must be logged in to like posts";

pub struct LikeService {
    likes: Arc<dyn LikeRepository>,
}

impl LikeService {
    pub fn new(likes: Arc<dyn LikeRepository>) -> Self {
        Self { likes }
    }

    pub async fn like(&self, actor: Option<Uuid>, post_id: Uuid) -> Result<(), ServiceError> {
        let user = require_user(actor, LOGIN_TO_LIKE)?;
        self.likes
            .insert(user, post_id, user)
            .await
            .map_err(|e| ServiceError::from_store(e, "Failed to update like"))?;
        Ok(())
    }

    pub async fn unlike(&self, actor: Option<Uuid>, post_id: Uuid) -> Result<(), ServiceError> {
        let user = require_user(actor, LOGIN_TO_LIKE)?;
        self.likes
            .delete(user, post_id, user)
            .await
            .map_err(|e| ServiceError::from_store(e, "Failed to update like"))?;
        Ok(())
    }

    /// Delete when `currently_liked`, insert otherwise. Returns the new state.
    pub async fn toggle(&self, actor: Option<Uuid>, post_id: Uuid, currently_liked: bool) -> Result<bool, ServiceError> {
        if currently_liked {
            self.unlike(actor, post_id).await?;
        } else {
            self.like(actor, post_id).await?;
        }
        Ok(!currently_liked)
    }

    /// Store-authoritative aggregate for one post
    pub async fn summary(&self, post_id: Uuid, viewer: Option<Uuid>) -> Result<LikeSummary, ServiceError> {
        let count = self.likes.count_for_post(post_id).await?;
        let is_liked = match viewer {
            Some(user) => self.likes.exists(post_id, user).await?,
            None => false,
        };
        Ok(LikeSummary { count, is_liked })
    }
}
