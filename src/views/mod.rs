//! View state for the client screens
//!
//! These types hold what a screen displays and react to user input and
//! store events. Rendering is left to the embedding UI.

pub mod like_toggle;
pub mod notice;
pub mod route;
pub mod search_box;
pub mod session;
pub mod story_viewer;
pub mod thread;

pub use like_toggle::LikeToggle;
pub use notice::{Notice, NoticeLevel};
pub use route::Route;
pub use search_box::{SearchBox, SearchState};
pub use session::{AuthState, SessionStore};
pub use story_viewer::{StoryPlayer, StoryViewer, ViewerControl, ViewerSnapshot};
pub use thread::{open_with_user, MessageThread};
