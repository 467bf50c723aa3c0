//! Post creation, post detail and comments

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::db::repositories::{CommentRepository, LikeRepository, PostRepository, ProfileRepository};
use crate::models::{AuthorSummary, CommentWithAuthor, LikeSummary, MediaKind, NewPost, Post};
use crate::services::error::require_user;
use crate::services::join::{unique_ids, AuthorIndex};
use crate::services::upload::{upload_stamp, Upload};
use crate::services::ServiceError;
use crate::storage::{Bucket, ObjectStorage};

pub const LOGIN_TO_POST: &str = "You must be logged in to post";
pub const LOGIN_TO_COMMENT: &str = "You must be logged in to comment";
pub const EMPTY_POST: &str = "Please add content or media to your post";

/// A post with its author, like aggregate and comments (oldest first)
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author: AuthorSummary,
    pub likes: LikeSummary,
    pub comments: Vec<CommentWithAuthor>,
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    profiles: Arc<dyn ProfileRepository>,
    likes: Arc<dyn LikeRepository>,
    comments: Arc<dyn CommentRepository>,
    storage: Arc<ObjectStorage>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        profiles: Arc<dyn ProfileRepository>,
        likes: Arc<dyn LikeRepository>,
        comments: Arc<dyn CommentRepository>,
        storage: Arc<ObjectStorage>,
    ) -> Self {
        Self {
            posts,
            profiles,
            likes,
            comments,
            storage,
        }
    }

    /// Upload the optional media to `posts/{user_id}/{millis}.{ext}`, then
    /// insert the post. Needs text or media.
    pub async fn create_post(
        &self,
        actor: Option<Uuid>,
        content: Option<String>,
        media: Option<Upload>,
    ) -> Result<Post, ServiceError> {
        let user = require_user(actor, LOGIN_TO_POST)?;

        let content = content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if content.is_none() && media.is_none() {
            return Err(ServiceError::Validation(EMPTY_POST.to_string()));
        }

        let mut input = NewPost {
            content,
            ..NewPost::default()
        };

        if let Some(upload) = media {
            let extension = self.storage.check_upload(&upload.content_type, upload.size())?;
            let path = format!("{}/{}.{}", user, upload_stamp(), extension);
            let object = self
                .storage
                .upload(Bucket::Posts, &path, &upload.bytes, false)
                .await?;
            input.media_url = Some(object.public_url);
            input.media_type = Some(MediaKind::for_post_upload(&upload.content_type));
        }

        let post = self
            .posts
            .create(user, user, &input)
            .await
            .map_err(|e| ServiceError::from_store(e, "You can only post as yourself"))?;

        tracing::info!(post_id = %post.id, user_id = %user, "post created");
        Ok(post)
    }

    /// Post detail for `viewer`. Comment authors are joined in one batch.
    pub async fn detail(&self, post_id: Uuid, viewer: Option<Uuid>) -> Result<PostDetail, ServiceError> {
        let post = self
            .posts
            .get_by_id(post_id)
            .await?
            .ok_or(ServiceError::NotFound("Post"))?;

        let (comments, count, is_liked) = tokio::try_join!(
            self.comments.list_for_post(post_id),
            self.likes.count_for_post(post_id),
            async {
                match viewer {
                    Some(user) => self.likes.exists(post_id, user).await,
                    None => Ok(false),
                }
            },
        )?;

        let author_ids = unique_ids(
            std::iter::once(post.user_id).chain(comments.iter().map(|c| c.user_id)),
        );
        let profiles = self.profiles.get_by_user_ids(&author_ids).await?;
        let authors = AuthorIndex::new(&profiles);

        Ok(PostDetail {
            author: authors.author(post.user_id),
            likes: LikeSummary { count, is_liked },
            comments: comments
                .into_iter()
                .map(|comment| CommentWithAuthor {
                    author: authors.author(comment.user_id),
                    comment,
                })
                .collect(),
            post,
        })
    }

    /// Insert a comment and return the reloaded detail.
    pub async fn add_comment(
        &self,
        actor: Option<Uuid>,
        post_id: Uuid,
        content: &str,
    ) -> Result<PostDetail, ServiceError> {
        let user = require_user(actor, LOGIN_TO_COMMENT)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::Validation("Comment cannot be empty".to_string()));
        }
        if self.posts.get_by_id(post_id).await?.is_none() {
            return Err(ServiceError::NotFound("Post"));
        }

        self.comments
            .insert(user, post_id, user, content)
            .await
            .map_err(|e| ServiceError::from_store(e, "You can only comment as yourself"))?;

        self.detail(post_id, Some(user)).await
    }
}
