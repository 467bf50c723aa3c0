//! Conversation model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthorSummary;

/// Two-party conversation. Participant order is whoever started it first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_1_id: Uuid,
    pub participant_2_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.participant_1_id == user_id || self.participant_2_id == user_id
    }

    /// The participant that is not `me`.
    pub fn other_participant(&self, me: Uuid) -> Uuid {
        if self.participant_1_id == me {
            self.participant_2_id
        } else {
            self.participant_1_id
        }
    }
}

/// Conversation list entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_user_id: Uuid,
    pub other_user: AuthorSummary,
}
