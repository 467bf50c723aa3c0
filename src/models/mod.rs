//! Data models
//!
//! Store entities (one struct per table) plus the denormalized shapes the
//! views render after a batch-fetch-and-merge.

mod comment;
mod conversation;
mod follow;
mod like;
mod message;
mod post;
mod profile;
mod session;
mod story;
mod user;

pub use comment::{Comment, CommentWithAuthor};
pub use conversation::{Conversation, ConversationSummary};
pub use follow::{Follow, FollowCounts};
pub use like::{Like, LikeSummary};
pub use message::Message;
pub use post::{FeedItem, MediaKind, NewPost, Post};
pub use profile::{AuthorSummary, Profile, UpdateProfileInput};
pub use session::Session;
pub use story::{Story, StoryGroup};
pub use user::{SignInInput, SignUpInput, User};
