//! Follow repository

use crate::db::policy::{ensure_allowed, PolicyViolation};
use crate::db::DynDatabasePool;
use crate::models::Follow;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Only the follower may create its own follow row
    async fn insert(&self, actor: Uuid, follower_id: Uuid, following_id: Uuid) -> Result<Follow>;

    /// Returns whether a row was removed
    async fn delete(&self, actor: Uuid, follower_id: Uuid, following_id: Uuid) -> Result<bool>;

    async fn exists(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool>;

    /// Rows where `following_id = user_id`
    async fn count_followers(&self, user_id: Uuid) -> Result<i64>;

    /// Rows where `follower_id = user_id`
    async fn count_following(&self, user_id: Uuid) -> Result<i64>;
}

pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn insert(&self, actor: Uuid, follower_id: Uuid, following_id: Uuid) -> Result<Follow> {
        let follow = Follow {
            id: Uuid::new_v4(),
            follower_id,
            following_id,
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO follows (id, follower_id, following_id, created_at)
            SELECT ?, ?, ?, ?
            WHERE ? = ?
            "#,
        )
        .bind(follow.id)
        .bind(follow.follower_id)
        .bind(follow.following_id)
        .bind(follow.created_at)
        .bind(follower_id)
        .bind(actor)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to insert follow")?;
        ensure_allowed(result.rows_affected(), "follows", actor)?;

        Ok(follow)
    }

    async fn delete(&self, actor: Uuid, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        if follower_id != actor {
            return Err(PolicyViolation::new("follows", actor).into());
        }
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND following_id = ?")
            .bind(follower_id)
            .bind(following_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete follow")?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM follows WHERE follower_id = ? AND following_id = ?")
                .bind(follower_id)
                .bind(following_id)
                .fetch_optional(self.pool.sqlite())
                .await
                .context("Failed to check follow")?;
        Ok(found.is_some())
    }

    async fn count_followers(&self, user_id: Uuid) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE following_id = ?")
            .bind(user_id)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count followers")
    }

    async fn count_following(&self, user_id: Uuid) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = ?")
            .bind(user_id)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count following")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::is_policy_violation;
    use crate::db::repositories::test_support::{insert_user, setup_pool};

    #[tokio::test]
    async fn test_follow_counts() {
        let pool = setup_pool().await;
        let a = insert_user(&pool, "a@example.com").await;
        let b = insert_user(&pool, "b@example.com").await;
        let c = insert_user(&pool, "c@example.com").await;
        let repo = SqlxFollowRepository::new(pool);

        repo.insert(a, a, b).await.unwrap();
        repo.insert(c, c, b).await.unwrap();
        repo.insert(b, b, a).await.unwrap();

        assert_eq!(repo.count_followers(b).await.unwrap(), 2);
        assert_eq!(repo.count_following(b).await.unwrap(), 1);
        assert!(repo.exists(a, b).await.unwrap());
        assert!(!repo.exists(b, c).await.unwrap());
    }

    #[tokio::test]
    async fn test_unfollow() {
        let pool = setup_pool().await;
        let a = insert_user(&pool, "a@example.com").await;
        let b = insert_user(&pool, "b@example.com").await;
        let repo = SqlxFollowRepository::new(pool);

        repo.insert(a, a, b).await.unwrap();
        assert!(repo.delete(a, a, b).await.unwrap());
        assert!(!repo.exists(a, b).await.unwrap());
    }

    #[tokio::test]
    async fn test_cannot_follow_on_behalf_of_others() {
        let pool = setup_pool().await;
        let a = insert_user(&pool, "a@example.com").await;
        let b = insert_user(&pool, "b@example.com").await;
        let repo = SqlxFollowRepository::new(pool);

        assert!(is_policy_violation(&repo.insert(b, a, b).await.unwrap_err()));
        repo.insert(a, a, b).await.unwrap();
        assert!(is_policy_violation(&repo.delete(b, a, b).await.unwrap_err()));
    }
}
