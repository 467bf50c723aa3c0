//! Feed aggregation
//!
//! Posts first, then profiles, likes and comment rows for the visible posts.
//! The three follow-up fetches run concurrently and are merged once all
//! have resolved.

use std::sync::Arc;

use uuid::Uuid;

use crate::db::repositories::{CommentRepository, LikeRepository, PostRepository, ProfileRepository};
use crate::models::{FeedItem, Post};
use crate::services::join::{merge_feed, unique_ids};
use crate::services::ServiceError;

pub struct FeedService {
    posts: Arc<dyn PostRepository>,
    profiles: Arc<dyn ProfileRepository>,
    likes: Arc<dyn LikeRepository>,
    comments: Arc<dyn CommentRepository>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        profiles: Arc<dyn ProfileRepository>,
        likes: Arc<dyn LikeRepository>,
        comments: Arc<dyn CommentRepository>,
    ) -> Self {
        Self {
            posts,
            profiles,
            likes,
            comments,
        }
    }

    /// Every post, newest first, with author and aggregates for `viewer`.
    pub async fn feed(&self, viewer: Option<Uuid>) -> Result<Vec<FeedItem>, ServiceError> {
        let posts = self.posts.list_recent().await?;
        self.aggregate(posts, viewer, true).await
    }

    /// One author's posts, newest first. Like and comment aggregates are only
    /// loaded for a signed-in viewer; anonymous viewers see zeros.
    pub async fn posts_by_user(&self, user_id: Uuid, viewer: Option<Uuid>) -> Result<Vec<FeedItem>, ServiceError> {
        let posts = self.posts.list_by_user(user_id).await?;
        self.aggregate(posts, viewer, viewer.is_some()).await
    }

    /// Join `posts` with their authors and, if `with_aggregates`, their likes
    /// and comment counts.
    pub async fn aggregate(
        &self,
        posts: Vec<Post>,
        viewer: Option<Uuid>,
        with_aggregates: bool,
    ) -> Result<Vec<FeedItem>, ServiceError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let author_ids = unique_ids(posts.iter().map(|p| p.user_id));
        let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();

        let (profiles, likes, comment_post_ids) = if with_aggregates {
            tokio::try_join!(
                self.profiles.get_by_user_ids(&author_ids),
                self.likes.list_for_posts(&post_ids),
                self.comments.list_post_ids(&post_ids),
            )?
        } else {
            (self.profiles.get_by_user_ids(&author_ids).await?, Vec::new(), Vec::new())
        };

        tracing::debug!(
            posts = posts.len(),
            profiles = profiles.len(),
            likes = likes.len(),
            comments = comment_post_ids.len(),
            "feed merged"
        );

        Ok(merge_feed(posts, &profiles, &likes, &comment_post_ids, viewer))
    }
}
