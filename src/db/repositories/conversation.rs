//! Conversation repository
//!
//! A conversation may only be created by its first participant, and only
//! when both users follow each other. The pair is not unique: two first
//! contacts racing each other can each create a row.

use crate::db::policy::ensure_allowed;
use crate::db::DynDatabasePool;
use crate::models::Conversation;
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Record};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str =
    "id, participant_1_id, participant_2_id, created_at, updated_at";

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Earliest conversation between the two users, in either participant order
    async fn find_between(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<Conversation>>;

    /// Insert with `actor` as participant 1, guarded by the mutual-follow policy
    async fn insert(&self, actor: Uuid, other: Uuid) -> Result<Conversation>;

    /// Visible only to participants
    async fn get_for_participant(&self, actor: Uuid, id: Uuid) -> Result<Option<Conversation>>;

    /// Conversations involving `user_id`, most recently updated first
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>>;

    /// Set `updated_at`; participants only
    async fn touch(&self, actor: Uuid, id: Uuid, at: DateTime<Utc>) -> Result<Conversation>;
}

pub struct SqlxConversationRepository {
    pool: DynDatabasePool,
    feed: ChangeFeed,
}

impl SqlxConversationRepository {
    pub fn new(pool: DynDatabasePool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    pub fn boxed(pool: DynDatabasePool, feed: ChangeFeed) -> Arc<dyn ConversationRepository> {
        Arc::new(Self::new(pool, feed))
    }
}

#[async_trait]
impl ConversationRepository for SqlxConversationRepository {
    async fn find_between(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<Conversation>> {
        let sql = format!(
            r#"
            SELECT {} FROM conversations
            WHERE (participant_1_id = ? AND participant_2_id = ?)
               OR (participant_1_id = ? AND participant_2_id = ?)
            ORDER BY created_at ASC, rowid ASC
            LIMIT 1
            "#,
            CONVERSATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(user_a)
            .bind(user_b)
            .bind(user_b)
            .bind(user_a)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to find conversation")?;
        Ok(row.as_ref().map(row_to_conversation_sqlite))
    }

    async fn insert(&self, actor: Uuid, other: Uuid) -> Result<Conversation> {
        let conversation = insert_conversation_sqlite(self.pool.sqlite(), actor, other).await?;
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Insert,
            Record::Conversations(conversation.clone()),
        ));
        Ok(conversation)
    }

    async fn get_for_participant(&self, actor: Uuid, id: Uuid) -> Result<Option<Conversation>> {
        get_conversation_sqlite(self.pool.sqlite(), actor, id).await
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        let sql = format!(
            r#"
            SELECT {} FROM conversations
            WHERE participant_1_id = ? OR participant_2_id = ?
            ORDER BY updated_at DESC, rowid DESC
            "#,
            CONVERSATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(user_id)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list conversations")?;
        Ok(rows.iter().map(row_to_conversation_sqlite).collect())
    }

    async fn touch(&self, actor: Uuid, id: Uuid, at: DateTime<Utc>) -> Result<Conversation> {
        let result = sqlx::query(
            r#"
            UPDATE conversations SET updated_at = ?
            WHERE id = ? AND (participant_1_id = ? OR participant_2_id = ?)
            "#,
        )
        .bind(at)
        .bind(id)
        .bind(actor)
        .bind(actor)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to touch conversation")?;
        ensure_allowed(result.rows_affected(), "conversations", actor)?;

        let conversation = get_conversation_sqlite(self.pool.sqlite(), actor, id)
            .await?
            .context("Conversation disappeared after update")?;
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Update,
            Record::Conversations(conversation.clone()),
        ));
        Ok(conversation)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_conversation_sqlite(pool: &SqlitePool, actor: Uuid, other: Uuid) -> Result<Conversation> {
    let now = Utc::now();
    let conversation = Conversation {
        id: Uuid::new_v4(),
        participant_1_id: actor,
        participant_2_id: other,
        created_at: now,
        updated_at: now,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO conversations (id, participant_1_id, participant_2_id, created_at, updated_at)
        SELECT ?, ?, ?, ?, ?
        WHERE ? <> ?
          AND EXISTS (SELECT 1 FROM follows WHERE follower_id = ? AND following_id = ?)
          AND EXISTS (SELECT 1 FROM follows WHERE follower_id = ? AND following_id = ?)
        "#,
    )
    .bind(conversation.id)
    .bind(actor)
    .bind(other)
    .bind(now)
    .bind(now)
    .bind(actor)
    .bind(other)
    .bind(actor)
    .bind(other)
    .bind(other)
    .bind(actor)
    .execute(pool)
    .await
    .context("Failed to create conversation")?;
    ensure_allowed(result.rows_affected(), "conversations", actor)?;

    Ok(conversation)
}

async fn get_conversation_sqlite(pool: &SqlitePool, actor: Uuid, id: Uuid) -> Result<Option<Conversation>> {
    let sql = format!(
        "SELECT {} FROM conversations WHERE id = ? AND (participant_1_id = ? OR participant_2_id = ?)",
        CONVERSATION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(actor)
        .bind(actor)
        .fetch_optional(pool)
        .await
        .context("Failed to get conversation")?;
    Ok(row.as_ref().map(row_to_conversation_sqlite))
}

fn row_to_conversation_sqlite(row: &sqlx::sqlite::SqliteRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        participant_1_id: row.get("participant_1_id"),
        participant_2_id: row.get("participant_2_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
