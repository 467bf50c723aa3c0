//! Profiles, avatars and follows

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::db::repositories::{FollowRepository, ProfileRepository};
use crate::models::{FeedItem, FollowCounts, Profile, UpdateProfileInput};
use crate::services::auth::validate_username;
use crate::services::error::require_user;
use crate::services::feed::FeedService;
use crate::services::upload::Upload;
use crate::services::ServiceError;
use crate::storage::{Bucket, ObjectStorage};

pub const LOGIN_TO_FOLLOW: &str = "You must be logged in to follow";
const LOGIN_FOR_PROFILE: &str = "You must be logged in to view your profile";

/// Own profile with follow counts
#[derive(Debug, Clone, Serialize)]
pub struct ProfileOverview {
    pub profile: Profile,
    pub counts: FollowCounts,
}

/// A profile page: the profile, its posts and its follow state
#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub profile: Profile,
    pub posts: Vec<FeedItem>,
    pub counts: FollowCounts,
    /// Whether the viewer follows this profile; always false for self or anonymous
    pub is_following: bool,
}

pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository>,
    follows: Arc<dyn FollowRepository>,
    feed: Arc<FeedService>,
    storage: Arc<ObjectStorage>,
}

impl ProfileService {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        follows: Arc<dyn FollowRepository>,
        feed: Arc<FeedService>,
        storage: Arc<ObjectStorage>,
    ) -> Self {
        Self {
            profiles,
            follows,
            feed,
            storage,
        }
    }

    async fn load(&self, user_id: Uuid) -> Result<Profile, ServiceError> {
        self.profiles
            .get_by_user_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("Profile"))
    }

    pub async fn counts(&self, user_id: Uuid) -> Result<FollowCounts, ServiceError> {
        let (followers, following) = tokio::try_join!(
            self.follows.count_followers(user_id),
            self.follows.count_following(user_id),
        )?;
        Ok(FollowCounts { followers, following })
    }

    pub async fn my_profile(&self, actor: Option<Uuid>) -> Result<ProfileOverview, ServiceError> {
        let user = require_user(actor, LOGIN_FOR_PROFILE)?;
        let profile = self.load(user).await?;
        let counts = self.counts(user).await?;
        Ok(ProfileOverview { profile, counts })
    }

    /// Owner-only edit of username, full name and bio.
    pub async fn update_profile(
        &self,
        actor: Option<Uuid>,
        input: UpdateProfileInput,
    ) -> Result<Profile, ServiceError> {
        let user = require_user(actor, LOGIN_FOR_PROFILE)?;

        let input = UpdateProfileInput {
            username: input.username.trim().to_string(),
            full_name: input.full_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            bio: input.bio.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()),
        };
        validate_username(&input.username)?;

        if let Some(existing) = self.profiles.get_by_username(&input.username).await? {
            if existing.user_id != user {
                return Err(ServiceError::Validation(format!(
                    "Username '{}' is already taken",
                    input.username
                )));
            }
        }

        let profile = self
            .profiles
            .update(user, user, &input)
            .await
            .map_err(|e| ServiceError::from_store(e, "You can only edit your own profile"))?;
        tracing::info!(user_id = %user, "profile updated");
        Ok(profile)
    }

    /// Upsert `avatars/{user_id}/avatar.{ext}` and point the profile at it.
    pub async fn upload_avatar(&self, actor: Option<Uuid>, image: Upload) -> Result<Profile, ServiceError> {
        let user = require_user(actor, LOGIN_FOR_PROFILE)?;
        if !image.content_type.starts_with("image/") {
            return Err(ServiceError::Validation("Avatar must be an image".to_string()));
        }
        let extension = self.storage.check_upload(&image.content_type, image.size())?;

        let path = format!("{}/avatar.{}", user, extension);
        let object = self
            .storage
            .upload(Bucket::Avatars, &path, &image.bytes, true)
            .await?;

        self.profiles
            .set_avatar_url(user, user, &object.public_url)
            .await
            .map_err(|e| ServiceError::from_store(e, "You can only edit your own profile"))
    }

    /// Own profile with every post and its aggregates.
    pub async fn profile_view(&self, actor: Option<Uuid>) -> Result<ProfilePage, ServiceError> {
        let user = require_user(actor, LOGIN_FOR_PROFILE)?;
        self.page(user, Some(user)).await
    }

    /// Another user's profile page as seen by `viewer`.
    pub async fn user_profile(&self, user_id: Uuid, viewer: Option<Uuid>) -> Result<ProfilePage, ServiceError> {
        self.page(user_id, viewer).await
    }

    async fn page(&self, user_id: Uuid, viewer: Option<Uuid>) -> Result<ProfilePage, ServiceError> {
        let profile = self.load(user_id).await?;
        let posts = self.feed.posts_by_user(user_id, viewer).await?;
        let counts = self.counts(user_id).await?;
        let is_following = match viewer {
            Some(me) if me != user_id => self.follows.exists(me, user_id).await?,
            _ => false,
        };
        Ok(ProfilePage {
            profile,
            posts,
            counts,
            is_following,
        })
    }

    /// Follow `target`, returning the target's updated counts.
    pub async fn follow(&self, actor: Option<Uuid>, target: Uuid) -> Result<FollowCounts, ServiceError> {
        let user = require_user(actor, LOGIN_TO_FOLLOW)?;
        if user == target {
            return Err(ServiceError::Validation("You cannot follow yourself".to_string()));
        }
        if !self.follows.exists(user, target).await? {
            self.follows
                .insert(user, user, target)
                .await
                .map_err(|e| ServiceError::from_store(e, "You can only follow as yourself"))?;
            tracing::debug!(follower = %user, following = %target, "followed");
        }
        self.counts(target).await
    }

    pub async fn unfollow(&self, actor: Option<Uuid>, target: Uuid) -> Result<FollowCounts, ServiceError> {
        let user = require_user(actor, LOGIN_TO_FOLLOW)?;
        self.follows
            .delete(user, user, target)
            .await
            .map_err(|e| ServiceError::from_store(e, "You can only unfollow as yourself"))?;
        self.counts(target).await
    }
}
