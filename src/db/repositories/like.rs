//! Like repository
//!
//! The row's existence is the liked state; toggling is insert/delete.

use crate::db::policy::{ensure_allowed, PolicyViolation};
use crate::db::DynDatabasePool;
use crate::models::Like;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

use super::placeholders;

#[async_trait]
pub trait LikeRepository: Send + Sync {
    async fn insert(&self, actor: Uuid, post_id: Uuid, user_id: Uuid) -> Result<Like>;

    /// Returns whether a row was removed
    async fn delete(&self, actor: Uuid, post_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn exists(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn count_for_post(&self, post_id: Uuid) -> Result<i64>;

    /// All likes on any of `post_ids` (`post_id IN (...)`)
    async fn list_for_posts(&self, post_ids: &[Uuid]) -> Result<Vec<Like>>;
}

pub struct SqlxLikeRepository {
    pool: DynDatabasePool,
}

impl SqlxLikeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LikeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LikeRepository for SqlxLikeRepository {
    async fn insert(&self, actor: Uuid, post_id: Uuid, user_id: Uuid) -> Result<Like> {
        let like = Like {
            id: Uuid::new_v4(),
            post_id,
            user_id,
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO likes (id, post_id, user_id, created_at)
            SELECT ?, ?, ?, ?
            WHERE ? = ?
            "#,
        )
        .bind(like.id)
        .bind(like.post_id)
        .bind(like.user_id)
        .bind(like.created_at)
        .bind(user_id)
        .bind(actor)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to insert like")?;
        ensure_allowed(result.rows_affected(), "likes", actor)?;

        Ok(like)
    }

    async fn delete(&self, actor: Uuid, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        if user_id != actor {
            return Err(PolicyViolation::new("likes", actor).into());
        }
        let result = sqlx::query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete like")?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM likes WHERE post_id = ? AND user_id = ?")
                .bind(post_id)
                .bind(user_id)
                .fetch_optional(self.pool.sqlite())
                .await
                .context("Failed to check like")?;
        Ok(found.is_some())
    }

    async fn count_for_post(&self, post_id: Uuid) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count likes")
    }

    async fn list_for_posts(&self, post_ids: &[Uuid]) -> Result<Vec<Like>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, post_id, user_id, created_at FROM likes WHERE post_id IN ({})",
            placeholders(post_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in post_ids {
            query = query.bind(*id);
        }

        let rows = query
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list likes")?;
        Ok(rows
            .iter()
            .map(|row| Like {
                id: row.get("id"),
                post_id: row.get("post_id"),
                user_id: row.get("user_id"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
