//! Story model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthorSummary, MediaKind};

/// Ephemeral media item, visible while `expires_at` is in the future.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub user_id: Uuid,
    pub media_url: String,
    pub media_type: MediaKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Story {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Stories of one author as shown in the story bar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryGroup {
    pub user_id: Uuid,
    pub author: AuthorSummary,
    pub stories: Vec<Story>,
}
