//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthorSummary, LikeSummary};

/// Media attached to a post or story
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Post uploads: anything that isn't `image/*` is treated as video.
    pub fn for_post_upload(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            Self::Image
        } else {
            Self::Video
        }
    }

    /// Story uploads: anything that isn't `video*` is treated as an image.
    pub fn for_story_upload(mime_type: &str) -> Self {
        if mime_type.starts_with("video") {
            Self::Video
        } else {
            Self::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            _ => Err(format!("Invalid media type: {}", s)),
        }
    }
}

/// Post entity, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a post
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
}

/// A post merged with its author and aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub post: Post,
    pub author: AuthorSummary,
    pub likes: LikeSummary,
    pub comment_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_upload_kind() {
        assert_eq!(MediaKind::for_post_upload("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::for_post_upload("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::for_post_upload("application/octet-stream"), MediaKind::Video);
    }

    #[test]
    fn test_story_upload_kind() {
        assert_eq!(MediaKind::for_story_upload("video/webm"), MediaKind::Video);
        assert_eq!(MediaKind::for_story_upload("image/gif"), MediaKind::Image);
        assert_eq!(MediaKind::for_story_upload(""), MediaKind::Image);
    }

    #[test]
    fn test_media_kind_parse() {
        assert_eq!("VIDEO".parse::<MediaKind>(), Ok(MediaKind::Video));
        assert!("audio".parse::<MediaKind>().is_err());
        assert_eq!(MediaKind::Image.to_string(), "image");
    }
}
