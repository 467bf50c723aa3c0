//! Comment repository

use crate::db::policy::ensure_allowed;
use crate::db::DynDatabasePool;
use crate::models::Comment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

use super::placeholders;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert(&self, actor: Uuid, post_id: Uuid, user_id: Uuid, content: &str) -> Result<Comment>;

    /// Comments on one post, oldest first
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>>;

    /// Post id of every comment on any of `post_ids`, for counting
    async fn list_post_ids(&self, post_ids: &[Uuid]) -> Result<Vec<Uuid>>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn insert(&self, actor: Uuid, post_id: Uuid, user_id: Uuid, content: &str) -> Result<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            user_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, user_id, content, created_at)
            SELECT ?, ?, ?, ?, ?
            WHERE ? = ?
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.user_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .bind(user_id)
        .bind(actor)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to insert comment")?;
        ensure_allowed(result.rows_affected(), "comments", actor)?;

        Ok(comment)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, user_id, content, created_at
            FROM comments
            WHERE post_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list comments")?;

        Ok(rows
            .iter()
            .map(|row| Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                user_id: row.get("user_id"),
                content: row.get("content"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn list_post_ids(&self, post_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT post_id FROM comments WHERE post_id IN ({})",
            placeholders(post_ids.len())
        );
        let mut query = sqlx::query_scalar::<_, Uuid>(&sql);
        for id in post_ids {
            query = query.bind(*id);
        }

        query
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list comment post IDs")
    }
}
