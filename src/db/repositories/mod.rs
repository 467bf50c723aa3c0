//! Database repositories
//!
//! One repository per table. Each exposes an async trait returning
//! `anyhow::Result` and an `Sqlx*Repository` implementation over the shared
//! pool. Writes that an access policy forbids fail with
//! [`PolicyViolation`](crate::db::PolicyViolation).

pub mod comment;
pub mod conversation;
pub mod follow;
pub mod like;
pub mod message;
pub mod post;
pub mod profile;
pub mod session;
pub mod story;
pub mod user;

pub use comment::{CommentRepository, SqlxCommentRepository};
pub use conversation::{ConversationRepository, SqlxConversationRepository};
pub use follow::{FollowRepository, SqlxFollowRepository};
pub use like::{LikeRepository, SqlxLikeRepository};
pub use message::{MessageRepository, SqlxMessageRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use profile::{ProfileRepository, SqlxProfileRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use story::{SqlxStoryRepository, StoryRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// `?, ?, ?` for an `IN (...)` list of `n` values
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use chrono::Utc;
    use uuid::Uuid;

    pub async fn setup_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    /// Insert a bare account row and return its id.
    pub async fn insert_user(pool: &DynDatabasePool, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(email)
            .bind("hash")
            .bind(Utc::now())
            .execute(pool.sqlite())
            .await
            .expect("Failed to insert user");
        id
    }

    /// Insert a profile row for `user_id` with `username`.
    pub async fn insert_profile(pool: &DynDatabasePool, user_id: Uuid, username: &str) {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO profiles (id, user_id, username, full_name, avatar_url, bio, created_at, updated_at) VALUES (?, ?, ?, NULL, NULL, NULL, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(username)
        .bind(now)
        .bind(now)
        .execute(pool.sqlite())
        .await
        .expect("Failed to insert profile");
    }

    pub async fn insert_follow(pool: &DynDatabasePool, follower: Uuid, following: Uuid) {
        sqlx::query(
            "INSERT INTO follows (id, follower_id, following_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(follower)
        .bind(following)
        .bind(Utc::now())
        .execute(pool.sqlite())
        .await
        .expect("Failed to insert follow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
