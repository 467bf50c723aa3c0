//! Story repository
//!
//! Expiry is enforced by filtering on `expires_at > now`; expired rows are
//! never deleted here.

use crate::db::policy::ensure_allowed;
use crate::db::DynDatabasePool;
use crate::models::Story;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

const STORY_COLUMNS: &str = "id, user_id, media_url, media_type, created_at, expires_at";

#[async_trait]
pub trait StoryRepository: Send + Sync {
    async fn create(&self, actor: Uuid, story: &Story) -> Result<Story>;

    /// Stories still active at `now`, newest first
    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Story>>;

    /// One author's stories still active at `now`, oldest first
    async fn list_active_by_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Story>>;
}

pub struct SqlxStoryRepository {
    pool: DynDatabasePool,
}

impl SqlxStoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl StoryRepository for SqlxStoryRepository {
    async fn create(&self, actor: Uuid, story: &Story) -> Result<Story> {
        create_story_sqlite(self.pool.sqlite(), actor, story).await
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Story>> {
        let sql = format!(
            "SELECT {} FROM stories WHERE expires_at > ? ORDER BY created_at DESC, rowid DESC",
            STORY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list active stories")?;
        rows.iter().map(row_to_story_sqlite).collect()
    }

    async fn list_active_by_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Story>> {
        let sql = format!(
            "SELECT {} FROM stories WHERE user_id = ? AND expires_at > ? ORDER BY created_at ASC, rowid ASC",
            STORY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(now)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list stories by user")?;
        rows.iter().map(row_to_story_sqlite).collect()
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_story_sqlite(pool: &SqlitePool, actor: Uuid, story: &Story) -> Result<Story> {
    let result = sqlx::query(
        r#"
        INSERT INTO stories (id, user_id, media_url, media_type, created_at, expires_at)
        SELECT ?, ?, ?, ?, ?, ?
        WHERE ? = ?
        "#,
    )
    .bind(story.id)
    .bind(story.user_id)
    .bind(&story.media_url)
    .bind(story.media_type.as_str())
    .bind(story.created_at)
    .bind(story.expires_at)
    .bind(story.user_id)
    .bind(actor)
    .execute(pool)
    .await
    .context("Failed to create story")?;
    ensure_allowed(result.rows_affected(), "stories", actor)?;

    Ok(story.clone())
}

fn row_to_story_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Story> {
    let media_type: String = row.get("media_type");
    Ok(Story {
        id: row.get("id"),
        user_id: row.get("user_id"),
        media_url: row.get("media_url"),
        media_type: media_type.parse().map_err(anyhow::Error::msg)?,
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    })
}
