//! Profile repository
//!
//! Profiles are readable by everyone. Updates are guarded so only the owning
//! account can change its row.

use crate::db::policy::ensure_allowed;
use crate::db::DynDatabasePool;
use crate::models::{Profile, UpdateProfileInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use super::placeholders;

const PROFILE_COLUMNS: &str =
    "id, user_id, username, full_name, avatar_url, bio, created_at, updated_at";

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>>;

    /// Case-insensitive username lookup
    async fn get_by_username(&self, username: &str) -> Result<Option<Profile>>;

    /// Batch lookup for client-side joins (`user_id IN (...)`)
    async fn get_by_user_ids(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>>;

    /// Owner-only update of username, full name and bio
    async fn update(&self, actor: Uuid, user_id: Uuid, input: &UpdateProfileInput) -> Result<Profile>;

    /// Owner-only avatar change
    async fn set_avatar_url(&self, actor: Uuid, user_id: Uuid, avatar_url: &str) -> Result<Profile>;

    /// Case-insensitive substring match on username or full name
    async fn search(&self, term: &str, limit: i64) -> Result<Vec<Profile>>;
}

pub struct SqlxProfileRepository {
    pool: DynDatabasePool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    async fn get_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let sql = format!("SELECT {} FROM profiles WHERE user_id = ?", PROFILE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get profile by user ID")?;
        Ok(row.as_ref().map(row_to_profile_sqlite))
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Profile>> {
        let sql = format!("SELECT {} FROM profiles WHERE username = ? COLLATE NOCASE", PROFILE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get profile by username")?;
        Ok(row.as_ref().map(row_to_profile_sqlite))
    }

    async fn get_by_user_ids(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>> {
        get_profiles_by_user_ids_sqlite(self.pool.sqlite(), user_ids).await
    }

    async fn update(&self, actor: Uuid, user_id: Uuid, input: &UpdateProfileInput) -> Result<Profile> {
        update_profile_sqlite(self.pool.sqlite(), actor, user_id, input).await
    }

    async fn set_avatar_url(&self, actor: Uuid, user_id: Uuid, avatar_url: &str) -> Result<Profile> {
        let result = sqlx::query(
            "UPDATE profiles SET avatar_url = ?, updated_at = ? WHERE user_id = ? AND user_id = ?",
        )
        .bind(avatar_url)
        .bind(Utc::now())
        .bind(user_id)
        .bind(actor)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update avatar")?;
        ensure_allowed(result.rows_affected(), "profiles", actor)?;

        self.get_by_user_id(user_id)
            .await?
            .context("Profile disappeared after avatar update")
    }

    async fn search(&self, term: &str, limit: i64) -> Result<Vec<Profile>> {
        search_profiles_sqlite(self.pool.sqlite(), term, limit).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

/// Profiles are only inserted alongside their account (see the user repository).
pub(crate) async fn create_profile_sqlite<'e, E>(executor: E, profile: &Profile) -> Result<Profile>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO profiles (id, user_id, username, full_name, avatar_url, bio, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(profile.id)
    .bind(profile.user_id)
    .bind(&profile.username)
    .bind(&profile.full_name)
    .bind(&profile.avatar_url)
    .bind(&profile.bio)
    .bind(profile.created_at)
    .bind(profile.updated_at)
    .execute(executor)
    .await
    .context("Failed to create profile")?;

    Ok(profile.clone())
}

async fn get_profiles_by_user_ids_sqlite(pool: &SqlitePool, user_ids: &[Uuid]) -> Result<Vec<Profile>> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {} FROM profiles WHERE user_id IN ({})",
        PROFILE_COLUMNS,
        placeholders(user_ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in user_ids {
        query = query.bind(*id);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get profiles by user IDs")?;
    Ok(rows.iter().map(row_to_profile_sqlite).collect())
}

async fn update_profile_sqlite(
    pool: &SqlitePool,
    actor: Uuid,
    user_id: Uuid,
    input: &UpdateProfileInput,
) -> Result<Profile> {
    let result = sqlx::query(
        r#"
        UPDATE profiles
        SET username = ?, full_name = ?, bio = ?, updated_at = ?
        WHERE user_id = ? AND user_id = ?
        "#,
    )
    .bind(&input.username)
    .bind(&input.full_name)
    .bind(&input.bio)
    .bind(Utc::now())
    .bind(user_id)
    .bind(actor)
    .execute(pool)
    .await
    .context("Failed to update profile")?;
    ensure_allowed(result.rows_affected(), "profiles", actor)?;

    let sql = format!("SELECT {} FROM profiles WHERE user_id = ?", PROFILE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to reload profile")?;
    Ok(row_to_profile_sqlite(&row))
}

async fn search_profiles_sqlite(pool: &SqlitePool, term: &str, limit: i64) -> Result<Vec<Profile>> {
    let pattern = format!("%{}%", escape_like(term));
    let sql = format!(
        r#"
        SELECT {} FROM profiles
        WHERE username LIKE ? ESCAPE '\' OR full_name LIKE ? ESCAPE '\'
        ORDER BY username
        LIMIT ?
        "#,
        PROFILE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to search profiles")?;
    Ok(rows.iter().map(row_to_profile_sqlite).collect())
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn row_to_profile_sqlite(row: &sqlx::sqlite::SqliteRow) -> Profile {
    Profile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        avatar_url: row.get("avatar_url"),
        bio: row.get("bio"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
