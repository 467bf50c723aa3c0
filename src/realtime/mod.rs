//! Realtime change notifications
//!
//! Repositories publish a [`ChangeEvent`] after every committed write to a
//! streamed table. Clients open a [`Subscription`] on a named channel scoped
//! by table and row filter; dropping the subscription unsubscribes it.
//!
//! Delivery is best effort: a subscriber that falls behind the channel
//! capacity skips the missed events. There is no replay and no reconnection.

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::models::{Conversation, Message};

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Tables that emit change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Messages,
    Conversations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// The row carried by a change event (the new row, or the old row on delete)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "table", content = "record", rename_all = "lowercase")]
pub enum Record {
    Messages(Message),
    Conversations(Conversation),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Self::Messages(_) => Table::Messages,
            Self::Conversations(_) => Table::Conversations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    #[serde(flatten)]
    pub record: Record,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, record: Record) -> Self {
        Self { kind, record }
    }
}

/// Row filter applied on top of the table scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    All,
    /// `conversation_id=eq.{id}` for messages, `id=eq.{id}` for conversations
    Conversation(Uuid),
}

impl RowFilter {
    fn matches(&self, record: &Record) -> bool {
        match (self, record) {
            (Self::All, _) => true,
            (Self::Conversation(id), Record::Messages(m)) => m.conversation_id == *id,
            (Self::Conversation(id), Record::Conversations(c)) => c.id == *id,
        }
    }
}

/// Shared publisher handle. Cloning is cheap; all clones feed the same channel.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many subscribers were listening.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(receivers, "change event published");
                receivers
            }
            // No subscribers is the common case.
            Err(_) => 0,
        }
    }

    /// Open a subscription on `name`, scoped to `table` and `filter`.
    pub fn subscribe(&self, name: impl Into<String>, table: Table, filter: RowFilter) -> Subscription {
        let name = name.into();
        tracing::debug!(channel = %name, ?table, ?filter, "subscribed");
        Subscription {
            name,
            table,
            filter,
            receiver: self.sender.subscribe(),
        }
    }

    /// Shorthand for the `messages-{conversation_id}` channel.
    pub fn subscribe_messages(&self, conversation_id: Uuid) -> Subscription {
        self.subscribe(
            format!("messages-{}", conversation_id),
            Table::Messages,
            RowFilter::Conversation(conversation_id),
        )
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live, filtered view of the change feed.
#[derive(Debug)]
pub struct Subscription {
    name: String,
    table: Table,
    filter: RowFilter,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, event: &ChangeEvent) -> bool {
        event.record.table() == self.table && self.filter.matches(&event.record)
    }

    /// Wait for the next matching event. Returns `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.name, skipped, "subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll for an already-buffered matching event.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        use tokio::sync::broadcast::error::TryRecvError;
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.name, skipped, "subscriber lagged, events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Explicit unsubscribe; equivalent to dropping.
    pub fn unsubscribe(self) {
        tracing::debug!(channel = %self.name, "unsubscribed");
    }

    /// Adapt into a `Stream` of matching events.
    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            let event = sub.recv().await?;
            Some((event, sub))
        })
    }
}
