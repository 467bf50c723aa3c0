//! Services layer
//!
//! One service per feature. Services take the acting user as
//! `Option<Uuid>`, enforce the signed-in requirement themselves and leave
//! ownership and mutual-follow rules to the repository access policies,
//! translating a policy rejection into [`ServiceError::AccessDenied`].

pub mod auth;
pub mod error;
pub mod feed;
pub mod join;
pub mod like;
pub mod messaging;
pub mod password;
pub mod post;
pub mod profile;
pub mod search;
pub mod story;
pub mod upload;

pub use auth::{validate_username, AuthService};
pub use error::{require_user, ServiceError};
pub use feed::FeedService;
pub use like::LikeService;
pub use messaging::MessagingService;
pub use password::{hash_password, verify_password};
pub use post::{PostDetail, PostService};
pub use profile::{ProfileOverview, ProfilePage, ProfileService};
pub use search::SearchService;
pub use story::{AuthorStories, StoryService};
pub use upload::Upload;
