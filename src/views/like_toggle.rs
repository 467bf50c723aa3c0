//! Like button state

use uuid::Uuid;

use crate::models::LikeSummary;
use crate::services::like::LOGIN_TO_LIKE;
use crate::services::{LikeService, ServiceError};
use crate::views::Notice;

/// Displayed like state of one post.
///
/// The count moves by one as soon as the button is pressed; the liked flag
/// only flips once the store confirms. A failed call leaves the adjusted
/// count in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub post_id: Uuid,
    pub liked: bool,
    pub count: i64,
}

impl LikeToggle {
    pub fn new(post_id: Uuid, summary: LikeSummary) -> Self {
        Self {
            post_id,
            liked: summary.is_liked,
            count: summary.count,
        }
    }

    pub async fn toggle(&mut self, service: &LikeService, actor: Option<Uuid>) -> Result<(), Notice> {
        if actor.is_none() {
            let err = ServiceError::Unauthenticated(LOGIN_TO_LIKE.to_string());
            return Err(Notice::from_error("Error", &err));
        }

        self.count += if self.liked { -1 } else { 1 };

        match service.toggle(actor, self.post_id, self.liked).await {
            Ok(now_liked) => {
                self.liked = now_liked;
                Ok(())
            }
            Err(e) => Err(Notice::from_error("Failed to update like", &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{LikeRepository, PostRepository, SqlxLikeRepository, SqlxPostRepository};
    use crate::models::{Like, NewPost};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FailingLikes;

    #[async_trait]
    impl LikeRepository for FailingLikes {
        async fn insert(&self, _: Uuid, _: Uuid, _: Uuid) -> anyhow::Result<Like> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn delete(&self, _: Uuid, _: Uuid, _: Uuid) -> anyhow::Result<bool> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn exists(&self, _: Uuid, _: Uuid) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn count_for_post(&self, _: Uuid) -> anyhow::Result<i64> {
            Ok(0)
        }
        async fn list_for_posts(&self, _: &[Uuid]) -> anyhow::Result<Vec<Like>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_like_then_unlike_restores_count() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "l@example.com").await;
        let post = SqlxPostRepository::new(pool.clone())
            .create(user, user, &NewPost {
                content: Some("p".into()),
                ..NewPost::default()
            })
            .await
            .unwrap();
        let service = LikeService::new(SqlxLikeRepository::boxed(pool));

        let mut toggle = LikeToggle::new(post.id, LikeSummary { count: 3, is_liked: false });
        toggle.toggle(&service, Some(user)).await.unwrap();
        assert_eq!((toggle.count, toggle.liked), (4, true));
        assert_eq!(service.summary(post.id, Some(user)).await.unwrap().count, 1);

        toggle.toggle(&service, Some(user)).await.unwrap();
        assert_eq!((toggle.count, toggle.liked), (3, false));
    }

    #[tokio::test]
    async fn test_signed_out_changes_nothing() {
        let service = LikeService::new(Arc::new(FailingLikes));
        let mut toggle = LikeToggle::new(Uuid::new_v4(), LikeSummary { count: 2, is_liked: false });

        let notice = toggle.toggle(&service, None).await.unwrap_err();
        assert_eq!(notice.description, LOGIN_TO_LIKE);
        assert_eq!((toggle.count, toggle.liked), (2, false));
    }

    #[tokio::test]
    async fn test_failure_keeps_optimistic_count() {
        let service = LikeService::new(Arc::new(FailingLikes));
        let mut toggle = LikeToggle::new(Uuid::new_v4(), LikeSummary { count: 2, is_liked: false });

        assert!(toggle.toggle(&service, Some(Uuid::new_v4())).await.is_err());
        assert_eq!(toggle.count, 3);
        assert!(!toggle.liked);
    }
}
