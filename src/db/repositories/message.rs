//! Message repository
//!
//! Only participants can read or write a conversation's messages. Every
//! committed insert or read-mark is published on the change feed.

use crate::db::policy::ensure_allowed;
use crate::db::DynDatabasePool;
use crate::models::Message;
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Record};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, created_at, read, read_at, delivered_at, seen_at";

const PARTICIPANT_GUARD: &str = r#"
    EXISTS (
        SELECT 1 FROM conversations c
        WHERE c.id = ? AND (c.participant_1_id = ? OR c.participant_2_id = ?)
    )
"#;

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Messages of one conversation, oldest first; empty for non-participants
    async fn list_for_conversation(&self, actor: Uuid, conversation_id: Uuid) -> Result<Vec<Message>>;

    /// Insert a message sent by `actor`
    async fn insert(&self, actor: Uuid, conversation_id: Uuid, content: &str) -> Result<Message>;

    /// Mark every unread message from the other participant as read
    async fn mark_read(&self, actor: Uuid, conversation_id: Uuid, at: DateTime<Utc>) -> Result<Vec<Message>>;
}

pub struct SqlxMessageRepository {
    pool: DynDatabasePool,
    feed: ChangeFeed,
}

impl SqlxMessageRepository {
    pub fn new(pool: DynDatabasePool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    pub fn boxed(pool: DynDatabasePool, feed: ChangeFeed) -> Arc<dyn MessageRepository> {
        Arc::new(Self::new(pool, feed))
    }
}

#[async_trait]
impl MessageRepository for SqlxMessageRepository {
    async fn list_for_conversation(&self, actor: Uuid, conversation_id: Uuid) -> Result<Vec<Message>> {
        list_messages_sqlite(self.pool.sqlite(), actor, conversation_id).await
    }

    async fn insert(&self, actor: Uuid, conversation_id: Uuid, content: &str) -> Result<Message> {
        let message = insert_message_sqlite(self.pool.sqlite(), actor, conversation_id, content).await?;
        self.feed
            .publish(ChangeEvent::new(ChangeKind::Insert, Record::Messages(message.clone())));
        Ok(message)
    }

    async fn mark_read(&self, actor: Uuid, conversation_id: Uuid, at: DateTime<Utc>) -> Result<Vec<Message>> {
        let updated = mark_read_sqlite(self.pool.sqlite(), actor, conversation_id, at).await?;
        for message in &updated {
            self.feed
                .publish(ChangeEvent::new(ChangeKind::Update, Record::Messages(message.clone())));
        }
        Ok(updated)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_messages_sqlite(pool: &SqlitePool, actor: Uuid, conversation_id: Uuid) -> Result<Vec<Message>> {
    let sql = format!(
        r#"
        SELECT {} FROM messages
        WHERE conversation_id = ? AND {}
        ORDER BY created_at ASC, rowid ASC
        "#,
        MESSAGE_COLUMNS, PARTICIPANT_GUARD
    );
    let rows = sqlx::query(&sql)
        .bind(conversation_id)
        .bind(conversation_id)
        .bind(actor)
        .bind(actor)
        .fetch_all(pool)
        .await
        .context("Failed to list messages")?;
    Ok(rows.iter().map(row_to_message_sqlite).collect())
}

async fn insert_message_sqlite(
    pool: &SqlitePool,
    actor: Uuid,
    conversation_id: Uuid,
    content: &str,
) -> Result<Message> {
    let message = Message {
        id: Uuid::new_v4(),
        conversation_id,
        sender_id: actor,
        content: content.to_string(),
        created_at: Utc::now(),
        read: false,
        read_at: None,
        delivered_at: None,
        seen_at: None,
    };

    let sql = format!(
        r#"
        INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
        SELECT ?, ?, ?, ?, ?
        WHERE {}
        "#,
        PARTICIPANT_GUARD
    );
    let result = sqlx::query(&sql)
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.created_at)
        .bind(conversation_id)
        .bind(actor)
        .bind(actor)
        .execute(pool)
        .await
        .context("Failed to send message")?;
    ensure_allowed(result.rows_affected(), "messages", actor)?;

    Ok(message)
}

async fn mark_read_sqlite(
    pool: &SqlitePool,
    actor: Uuid,
    conversation_id: Uuid,
    at: DateTime<Utc>,
) -> Result<Vec<Message>> {
    let sql = format!(
        r#"
        UPDATE messages SET read = 1, read_at = ?
        WHERE conversation_id = ? AND sender_id <> ? AND read = 0 AND {}
        RETURNING {}
        "#,
        PARTICIPANT_GUARD, MESSAGE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(at)
        .bind(conversation_id)
        .bind(actor)
        .bind(conversation_id)
        .bind(actor)
        .bind(actor)
        .fetch_all(pool)
        .await
        .context("Failed to mark messages read")?;

    let mut messages: Vec<Message> = rows.iter().map(row_to_message_sqlite).collect();
    messages.sort_by_key(|m| m.created_at);
    Ok(messages)
}

fn row_to_message_sqlite(row: &sqlx::sqlite::SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        read: row.get("read"),
        read_at: row.get("read_at"),
        delivered_at: row.get("delivered_at"),
        seen_at: row.get("seen_at"),
    }
}
