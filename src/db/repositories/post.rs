//! Post repository

use crate::db::policy::ensure_allowed;
use crate::db::DynDatabasePool;
use crate::models::{MediaKind, NewPost, Post};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

const POST_COLUMNS: &str = "id, user_id, content, media_url, media_type, created_at";

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post authored by `user_id`; only `actor` may author as itself.
    async fn create(&self, actor: Uuid, user_id: Uuid, input: &NewPost) -> Result<Post>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Post>>;

    /// All posts, newest first
    async fn list_recent(&self) -> Result<Vec<Post>>;

    /// One author's posts, newest first
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Post>>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, actor: Uuid, user_id: Uuid, input: &NewPost) -> Result<Post> {
        create_post_sqlite(self.pool.sqlite(), actor, user_id, input).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get post by ID")?;
        row.as_ref().map(row_to_post_sqlite).transpose()
    }

    async fn list_recent(&self) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM posts ORDER BY created_at DESC, rowid DESC",
            POST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list posts")?;
        rows.iter().map(row_to_post_sqlite).collect()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM posts WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
            POST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list posts by user")?;
        rows.iter().map(row_to_post_sqlite).collect()
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(
    pool: &SqlitePool,
    actor: Uuid,
    user_id: Uuid,
    input: &NewPost,
) -> Result<Post> {
    let post = Post {
        id: Uuid::new_v4(),
        user_id,
        content: input.content.clone(),
        media_url: input.media_url.clone(),
        media_type: input.media_type,
        created_at: Utc::now(),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO posts (id, user_id, content, media_url, media_type, created_at)
        SELECT ?, ?, ?, ?, ?, ?
        WHERE ? = ?
        "#,
    )
    .bind(post.id)
    .bind(post.user_id)
    .bind(&post.content)
    .bind(&post.media_url)
    .bind(post.media_type.map(|m| m.as_str()))
    .bind(post.created_at)
    .bind(user_id)
    .bind(actor)
    .execute(pool)
    .await
    .context("Failed to create post")?;
    ensure_allowed(result.rows_affected(), "posts", actor)?;

    Ok(post)
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let media_type: Option<String> = row.get("media_type");
    let media_type = media_type
        .map(|s| s.parse::<MediaKind>())
        .transpose()
        .map_err(anyhow::Error::msg)?;

    Ok(Post {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        media_url: row.get("media_url"),
        media_type,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::is_policy_violation;
    use crate::db::repositories::test_support::{insert_user, setup_pool};

    fn text(content: &str) -> NewPost {
        NewPost {
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "a@example.com").await;
        let repo = SqlxPostRepository::new(pool);

        let input = NewPost {
            content: None,
            media_url: Some("/storage/posts/x.png".to_string()),
            media_type: Some(MediaKind::Image),
        };
        let post = repo.create(author, author, &input).await.unwrap();

        let found = repo.get_by_id(post.id).await.unwrap().expect("post");
        assert_eq!(found.media_type, Some(MediaKind::Image));
        assert!(found.content.is_none());
    }

    #[tokio::test]
    async fn test_cannot_post_as_someone_else() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "a@example.com").await;
        let other = insert_user(&pool, "b@example.com").await;
        let repo = SqlxPostRepository::new(pool);

        let err = repo.create(other, author, &text("impostor")).await.unwrap_err();
        assert!(is_policy_violation(&err));
        assert!(repo.list_recent().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lists_are_newest_first() {
        let pool = setup_pool().await;
        let a = insert_user(&pool, "a@example.com").await;
        let b = insert_user(&pool, "b@example.com").await;
        let repo = SqlxPostRepository::new(pool);

        let first = repo.create(a, a, &text("first")).await.unwrap();
        let second = repo.create(b, b, &text("second")).await.unwrap();
        let third = repo.create(a, a, &text("third")).await.unwrap();

        let all: Vec<_> = repo.list_recent().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(all, vec![third.id, second.id, first.id]);

        let by_a: Vec<_> = repo.list_by_user(a).await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(by_a, vec![third.id, first.id]);
    }
}
