//! Direct messaging between mutual followers
//!
//! A conversation is resolved (found or created) per pair of users. Creation
//! is gated twice: the service checks both follow rows first, and the store
//! re-checks the mutual-follow policy on insert. Neither step locks, so two
//! first contacts racing each other may both create a conversation; lookups
//! then settle on the earliest one.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::db::repositories::{ConversationRepository, FollowRepository, MessageRepository, ProfileRepository};
use crate::models::{Conversation, ConversationSummary, Message};
use crate::realtime::{ChangeFeed, Subscription};
use crate::services::error::require_user;
use crate::services::join::{unique_ids, AuthorIndex};
use crate::services::ServiceError;

pub const LOGIN_TO_MESSAGE: &str = "You must be logged in to send messages";
/// Shown when the follow pre-check fails
pub const NOT_MUTUAL_FOLLOWERS: &str = "You can only message users you both follow";
/// Shown when the store rejects the conversation insert
pub const MUTUAL_FOLLOWERS_ONLY: &str = "You can only message mutual followers";

pub struct MessagingService {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    follows: Arc<dyn FollowRepository>,
    profiles: Arc<dyn ProfileRepository>,
    feed: ChangeFeed,
}

impl MessagingService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        follows: Arc<dyn FollowRepository>,
        profiles: Arc<dyn ProfileRepository>,
        feed: ChangeFeed,
    ) -> Self {
        Self {
            conversations,
            messages,
            follows,
            profiles,
            feed,
        }
    }

    /// The user's conversations, most recent first, each joined with the
    /// other participant's profile.
    pub async fn list_conversations(&self, actor: Option<Uuid>) -> Result<Vec<ConversationSummary>, ServiceError> {
        let user = require_user(actor, LOGIN_TO_MESSAGE)?;
        let conversations = self.conversations.list_for_user(user).await?;
        if conversations.is_empty() {
            return Ok(Vec::new());
        }

        let others = unique_ids(conversations.iter().map(|c| c.other_participant(user)));
        let profiles = self.profiles.get_by_user_ids(&others).await?;
        let authors = AuthorIndex::new(&profiles);

        Ok(conversations
            .into_iter()
            .map(|conversation| {
                let other_user_id = conversation.other_participant(user);
                ConversationSummary {
                    other_user: authors.author(other_user_id),
                    other_user_id,
                    conversation,
                }
            })
            .collect())
    }

    /// Find the conversation with `other`, or create it if both users follow
    /// each other.
    pub async fn resolve_conversation(&self, actor: Option<Uuid>, other: Uuid) -> Result<Conversation, ServiceError> {
        let user = require_user(actor, LOGIN_TO_MESSAGE)?;
        if user == other {
            return Err(ServiceError::Validation("You cannot message yourself".to_string()));
        }

        if let Some(existing) = self.conversations.find_between(user, other).await? {
            return Ok(existing);
        }

        let (i_follow, they_follow) = tokio::try_join!(
            self.follows.exists(user, other),
            self.follows.exists(other, user),
        )?;
        if !(i_follow && they_follow) {
            tracing::warn!(%user, %other, i_follow, they_follow, "conversation refused: not mutual followers");
            return Err(ServiceError::AccessDenied(NOT_MUTUAL_FOLLOWERS.to_string()));
        }

        let conversation = self
            .conversations
            .insert(user, other)
            .await
            .map_err(|e| ServiceError::from_store(e, MUTUAL_FOLLOWERS_ONLY))?;
        tracing::info!(conversation_id = %conversation.id, "conversation created");
        Ok(conversation)
    }

    async fn participant_conversation(&self, user: Uuid, conversation_id: Uuid) -> Result<Conversation, ServiceError> {
        self.conversations
            .get_for_participant(user, conversation_id)
            .await?
            .ok_or(ServiceError::NotFound("Conversation"))
    }

    /// Messages oldest first
    pub async fn messages(&self, actor: Option<Uuid>, conversation_id: Uuid) -> Result<Vec<Message>, ServiceError> {
        let user = require_user(actor, LOGIN_TO_MESSAGE)?;
        self.participant_conversation(user, conversation_id).await?;
        Ok(self.messages.list_for_conversation(user, conversation_id).await?)
    }

    /// Send trimmed `content`. Blank input sends nothing and returns `None`.
    pub async fn send(
        &self,
        actor: Option<Uuid>,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<Option<Message>, ServiceError> {
        let user = require_user(actor, LOGIN_TO_MESSAGE)?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let message = self
            .messages
            .insert(user, conversation_id, content)
            .await
            .map_err(|e| ServiceError::from_store(e, "You are not part of this conversation"))?;
        self.conversations
            .touch(user, conversation_id, message.created_at)
            .await
            .map_err(|e| ServiceError::from_store(e, "You are not part of this conversation"))?;

        tracing::debug!(%conversation_id, message_id = %message.id, "message sent");
        Ok(Some(message))
    }

    /// Mark the other participant's unread messages read; returns the updated rows.
    pub async fn mark_read(&self, actor: Option<Uuid>, conversation_id: Uuid) -> Result<Vec<Message>, ServiceError> {
        let user = require_user(actor, LOGIN_TO_MESSAGE)?;
        Ok(self.messages.mark_read(user, conversation_id, Utc::now()).await?)
    }

    /// Live changes to the conversation's messages, for participants only.
    pub async fn subscribe(&self, actor: Option<Uuid>, conversation_id: Uuid) -> Result<Subscription, ServiceError> {
        let user = require_user(actor, LOGIN_TO_MESSAGE)?;
        self.participant_conversation(user, conversation_id).await?;
        Ok(self.feed.subscribe_messages(conversation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_follow, insert_profile, insert_user, setup_pool};
    use crate::db::repositories::{
        SqlxConversationRepository, SqlxFollowRepository, SqlxMessageRepository, SqlxProfileRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::realtime::{ChangeKind, Record};

    async fn setup() -> (MessagingService, DynDatabasePool) {
        let pool = setup_pool().await;
        let feed = ChangeFeed::default();
        let service = MessagingService::new(
            SqlxConversationRepository::boxed(pool.clone(), feed.clone()),
            SqlxMessageRepository::boxed(pool.clone(), feed.clone()),
            SqlxFollowRepository::boxed(pool.clone()),
            SqlxProfileRepository::boxed(pool.clone()),
            feed,
        );
        (service, pool)
    }

    async fn conversation_rows(pool: &DynDatabasePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(pool.sqlite())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolution_is_symmetric() {
        let (service, pool) = setup().await;
        let x = insert_user(&pool, "x@example.com").await;
        let y = insert_user(&pool, "y@example.com").await;
        insert_follow(&pool, x, y).await;
        insert_follow(&pool, y, x).await;

        let from_x = service.resolve_conversation(Some(x), y).await.unwrap();
        let from_y = service.resolve_conversation(Some(y), x).await.unwrap();
        assert_eq!(from_x.id, from_y.id);
        assert_eq!(conversation_rows(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_one_way_follow_is_refused_without_insert() {
        let (service, pool) = setup().await;
        let x = insert_user(&pool, "x@example.com").await;
        let y = insert_user(&pool, "y@example.com").await;
        insert_follow(&pool, x, y).await;

        let err = service.resolve_conversation(Some(x), y).await.unwrap_err();
        match err {
            ServiceError::AccessDenied(msg) => assert_eq!(msg, NOT_MUTUAL_FOLLOWERS),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(conversation_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_send_touches_conversation_and_publishes() {
        let (service, pool) = setup().await;
        let x = insert_user(&pool, "x@example.com").await;
        let y = insert_user(&pool, "y@example.com").await;
        insert_follow(&pool, x, y).await;
        insert_follow(&pool, y, x).await;
        let conversation = service.resolve_conversation(Some(x), y).await.unwrap();

        let mut sub = service.subscribe(Some(y), conversation.id).await.unwrap();
        assert!(service.send(Some(x), conversation.id, "   ").await.unwrap().is_none());
        let sent = service
            .send(Some(x), conversation.id, " hello ")
            .await
            .unwrap()
            .expect("message");
        assert_eq!(sent.content, "hello");

        let event = sub.recv().await.expect("insert event");
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record, Record::Messages(sent.clone()));

        let listed = service.list_conversations(Some(y)).await.unwrap();
        assert_eq!(listed[0].conversation.updated_at, sent.created_at);
        assert_eq!(listed[0].other_user_id, x);

        let read = service.mark_read(Some(y), conversation.id).await.unwrap();
        assert_eq!(read.len(), 1);
        assert!(read[0].read);
        let event = sub.recv().await.expect("update event");
        assert_eq!(event.kind, ChangeKind::Update);
    }

    #[tokio::test]
    async fn test_outsider_cannot_read_or_subscribe() {
        let (service, pool) = setup().await;
        let x = insert_user(&pool, "x@example.com").await;
        let y = insert_user(&pool, "y@example.com").await;
        let z = insert_user(&pool, "z@example.com").await;
        insert_follow(&pool, x, y).await;
        insert_follow(&pool, y, x).await;
        let conversation = service.resolve_conversation(Some(x), y).await.unwrap();

        assert!(matches!(
            service.messages(Some(z), conversation.id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert!(service.subscribe(Some(z), conversation.id).await.is_err());
        assert!(matches!(
            service.send(Some(z), conversation.id, "hi").await.unwrap_err(),
            ServiceError::AccessDenied(_)
        ));
    }

    #[tokio::test]
    async fn test_conversation_list_uses_placeholder_for_missing_profile() {
        let (service, pool) = setup().await;
        let x = insert_user(&pool, "x@example.com").await;
        let y = insert_user(&pool, "y@example.com").await;
        insert_profile(&pool, x, "xavier").await;
        insert_follow(&pool, x, y).await;
        insert_follow(&pool, y, x).await;
        service.resolve_conversation(Some(x), y).await.unwrap();

        let for_x = service.list_conversations(Some(x)).await.unwrap();
        assert_eq!(for_x[0].other_user.username, "Unknown");
        let for_y = service.list_conversations(Some(y)).await.unwrap();
        assert_eq!(for_y[0].other_user.username, "xavier");
    }
}
