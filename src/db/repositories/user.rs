//! Account repository

use crate::db::DynDatabasePool;
use crate::models::{Profile, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use super::profile::create_profile_sqlite;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert the account and its profile together; neither row survives a failure.
    async fn create_with_profile(&self, user: &User, profile: &Profile) -> Result<User>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Case-insensitive lookup
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create_with_profile(&self, user: &User, profile: &Profile) -> Result<User> {
        create_account_sqlite(self.pool.sqlite(), user, profile).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        get_user_by_id_sqlite(self.pool.sqlite(), id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        get_user_by_email_sqlite(self.pool.sqlite(), email).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite<'e, E>(executor: E, user: &User) -> Result<User>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(executor)
        .await
        .context("Failed to create user")?;

    Ok(user.clone())
}

async fn create_account_sqlite(pool: &SqlitePool, user: &User, profile: &Profile) -> Result<User> {
    let mut tx = pool.begin().await.context("Failed to begin sign-up transaction")?;

    create_user_sqlite(&mut *tx, user).await?;
    create_profile_sqlite(&mut *tx, profile).await?;

    tx.commit().await.context("Failed to commit sign-up")?;
    Ok(user.clone())
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, email, password_hash, created_at FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    Ok(row.as_ref().map(row_to_user_sqlite))
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, password_hash, created_at FROM users WHERE email = ? COLLATE NOCASE",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by email")?;

    Ok(row.as_ref().map(row_to_user_sqlite))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}
