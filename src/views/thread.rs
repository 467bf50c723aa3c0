//! Conversation view
//!
//! Opening a conversation with a user resolves it first; a refusal sends the
//! viewer back to the feed. An open thread keeps one live subscription to
//! its messages, replaced whenever another conversation is opened.

use uuid::Uuid;

use crate::models::{Conversation, Message};
use crate::realtime::{ChangeEvent, ChangeKind, Record, Subscription};
use crate::services::{MessagingService, ServiceError};
use crate::views::{Notice, Route};

/// Resolve the conversation with `other` for the messages deep link.
pub async fn open_with_user(
    service: &MessagingService,
    actor: Option<Uuid>,
    other: Uuid,
) -> Result<Conversation, Notice> {
    service
        .resolve_conversation(actor, other)
        .await
        .map_err(|e| match e {
            ServiceError::AccessDenied(_) => Notice::from_error("Access denied", &e).redirect_to(Route::Feed),
            other => Notice::from_error("Failed to open conversation", &other),
        })
}

#[derive(Default)]
pub struct MessageThread {
    conversation_id: Option<Uuid>,
    messages: Vec<Message>,
    subscription: Option<Subscription>,
    scroll_to_bottom: bool,
}

impl MessageThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_id(&self) -> Option<Uuid> {
        self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The composer is usable only while a conversation is open.
    pub fn composer_enabled(&self) -> bool {
        self.conversation_id.is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Returns and clears a pending scroll-to-bottom request.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_bottom)
    }

    /// Switch to `conversation_id`: drop the old subscription, load the
    /// history and subscribe to its changes.
    pub async fn open(
        &mut self,
        service: &MessagingService,
        actor: Option<Uuid>,
        conversation_id: Uuid,
    ) -> Result<(), Notice> {
        self.close();

        let subscription = service
            .subscribe(actor, conversation_id)
            .await
            .map_err(|e| Notice::from_error("Failed to open conversation", &e))?;
        let messages = service
            .messages(actor, conversation_id)
            .await
            .map_err(|e| Notice::from_error("Failed to load messages", &e))?;

        self.conversation_id = Some(conversation_id);
        self.messages = messages;
        self.subscription = Some(subscription);
        self.scroll_to_bottom = true;
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.conversation_id = None;
        self.messages.clear();
        self.scroll_to_bottom = false;
    }

    pub fn apply(&mut self, event: ChangeEvent) {
        let message = match event.record {
            Record::Messages(message) if Some(message.conversation_id) == self.conversation_id => message,
            _ => return,
        };
        match event.kind {
            ChangeKind::Insert => self.append(message),
            ChangeKind::Update => {
                if let Some(slot) = self.messages.iter_mut().find(|m| m.id == message.id) {
                    *slot = message;
                }
            }
            ChangeKind::Delete => self.messages.retain(|m| m.id != message.id),
        }
    }

    fn append(&mut self, message: Message) {
        if self.messages.iter().all(|m| m.id != message.id) {
            self.messages.push(message);
            self.scroll_to_bottom = true;
        }
    }

    /// Apply every change already delivered. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.subscription.as_mut().and_then(|s| s.try_recv()) {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next change and apply it. `false` once the stream ended
    /// or nothing is open.
    pub async fn next_change(&mut self) -> bool {
        let event = match self.subscription.as_mut() {
            Some(subscription) => subscription.recv().await,
            None => return false,
        };
        match event {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    /// Send from the composer. The sent message is shown at once; the echo
    /// from the change stream is deduplicated.
    pub async fn send(&mut self, service: &MessagingService, actor: Option<Uuid>, text: &str) -> Result<(), Notice> {
        let conversation_id = match self.conversation_id {
            Some(id) => id,
            None => return Ok(()),
        };
        match service.send(actor, conversation_id, text).await {
            Ok(Some(message)) => {
                self.append(message);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(Notice::from_error("Failed to send message", &e)),
        }
    }
}
