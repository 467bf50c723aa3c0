//! Stories: the story bar, one author's stories and story uploads

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::repositories::{ProfileRepository, StoryRepository};
use crate::models::{AuthorSummary, MediaKind, Story, StoryGroup};
use crate::services::error::require_user;
use crate::services::join::{group_stories, unique_ids};
use crate::services::upload::{upload_stamp, Upload};
use crate::services::ServiceError;
use crate::storage::{Bucket, ObjectStorage};

pub const LOGIN_TO_SHARE_STORY: &str = "You must be logged in to share a story";

/// Default story lifetime in hours
pub const DEFAULT_STORY_TTL_HOURS: i64 = 24;

/// One author's active stories, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct AuthorStories {
    pub user_id: Uuid,
    pub author: AuthorSummary,
    pub stories: Vec<Story>,
}

pub struct StoryService {
    stories: Arc<dyn StoryRepository>,
    profiles: Arc<dyn ProfileRepository>,
    storage: Arc<ObjectStorage>,
    ttl: Duration,
}

impl StoryService {
    pub fn new(
        stories: Arc<dyn StoryRepository>,
        profiles: Arc<dyn ProfileRepository>,
        storage: Arc<ObjectStorage>,
    ) -> Self {
        Self {
            stories,
            profiles,
            storage,
            ttl: Duration::hours(DEFAULT_STORY_TTL_HOURS),
        }
    }

    pub fn with_ttl_hours(mut self, hours: i64) -> Self {
        self.ttl = Duration::hours(hours);
        self
    }

    /// Active stories newest first, grouped by author in first-seen order.
    pub async fn story_bar(&self, now: DateTime<Utc>) -> Result<Vec<StoryGroup>, ServiceError> {
        let stories = self.stories.list_active(now).await?;
        if stories.is_empty() {
            return Ok(Vec::new());
        }
        let author_ids = unique_ids(stories.iter().map(|s| s.user_id));
        let profiles = self.profiles.get_by_user_ids(&author_ids).await?;
        Ok(group_stories(stories, &profiles))
    }

    pub async fn author_stories(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<AuthorStories, ServiceError> {
        let (stories, profile) = tokio::try_join!(
            self.stories.list_active_by_user(user_id, now),
            self.profiles.get_by_user_id(user_id),
        )?;
        Ok(AuthorStories {
            user_id,
            author: profile
                .as_ref()
                .map(AuthorSummary::from)
                .unwrap_or_else(AuthorSummary::unknown),
            stories,
        })
    }

    /// Upload to `posts/stories/{user_id}/{user_id}-{millis}.{ext}` and insert
    /// a story that expires after the configured lifetime.
    pub async fn create_story(&self, actor: Option<Uuid>, media: Upload) -> Result<Story, ServiceError> {
        let user = require_user(actor, LOGIN_TO_SHARE_STORY)?;
        let extension = self.storage.check_upload(&media.content_type, media.size())?;

        let path = format!("stories/{}/{}-{}.{}", user, user, upload_stamp(), extension);
        let object = self
            .storage
            .upload(Bucket::Posts, &path, &media.bytes, false)
            .await?;

        let now = Utc::now();
        let story = Story {
            id: Uuid::new_v4(),
            user_id: user,
            media_url: object.public_url,
            media_type: MediaKind::for_story_upload(&media.content_type),
            created_at: now,
            expires_at: now + self.ttl,
        };

        let story = self
            .stories
            .create(user, &story)
            .await
            .map_err(|e| ServiceError::from_store(e, "You can only share your own stories"))?;

        tracing::info!(story_id = %story.id, user_id = %user, "story shared");
        Ok(story)
    }
}
