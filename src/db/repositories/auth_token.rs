//! Auth token repository
//!
//! Database operations for opaque login tokens. Tokens are created at login,
//! deleted at logout, and swept once expired.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::AuthToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Auth token repository trait
#[async_trait]
pub trait AuthTokenRepository: Send + Sync {
    /// Store a new token
    async fn create(&self, token: &AuthToken) -> Result<()>;

    /// Look up a token by its value
    async fn get(&self, id: &str) -> Result<Option<AuthToken>>;

    /// Delete a token (logout)
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all tokens past their expiry. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based auth token repository implementation
pub struct SqlxAuthTokenRepository {
    pool: DynDatabasePool,
}

impl SqlxAuthTokenRepository {
    /// Create a new SQLx auth token repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuthTokenRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AuthTokenRepository for SqlxAuthTokenRepository {
    async fn create(&self, token: &AuthToken) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_token_sqlite(self.pool.as_sqlite().unwrap(), token).await
            }
            DatabaseDriver::Mysql => create_token_mysql(self.pool.as_mysql().unwrap(), token).await,
        }
    }

    async fn get(&self, id: &str) -> Result<Option<AuthToken>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_token_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_token_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_token_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_token_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_expired_sqlite(self.pool.as_sqlite().unwrap(), now).await
            }
            DatabaseDriver::Mysql => delete_expired_mysql(self.pool.as_mysql().unwrap(), now).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_token_sqlite(pool: &SqlitePool, token: &AuthToken) -> Result<()> {
    sqlx::query(
        "INSERT INTO auth_tokens (id, teacher_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&token.id)
    .bind(token.teacher_id)
    .bind(token.expires_at)
    .bind(token.created_at)
    .execute(pool)
    .await
    .context("Failed to create auth token")?;
    Ok(())
}

async fn get_token_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<AuthToken>> {
    let row = sqlx::query(
        "SELECT id, teacher_id, expires_at, created_at FROM auth_tokens WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get auth token")?;

    match row {
        Some(row) => Ok(Some(AuthToken {
            id: row.try_get("id")?,
            teacher_id: row.try_get("teacher_id")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        })),
        None => Ok(None),
    }
}

async fn delete_token_sqlite(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM auth_tokens WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete auth token")?;
    Ok(())
}

async fn delete_expired_sqlite(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to delete expired tokens")?;
    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_token_mysql(pool: &MySqlPool, token: &AuthToken) -> Result<()> {
    sqlx::query(
        "INSERT INTO auth_tokens (id, teacher_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&token.id)
    .bind(token.teacher_id)
    .bind(token.expires_at)
    .bind(token.created_at)
    .execute(pool)
    .await
    .context("Failed to create auth token")?;
    Ok(())
}

async fn get_token_mysql(pool: &MySqlPool, id: &str) -> Result<Option<AuthToken>> {
    let row = sqlx::query(
        "SELECT id, teacher_id, expires_at, created_at FROM auth_tokens WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get auth token")?;

    match row {
        Some(row) => Ok(Some(AuthToken {
            id: row.try_get("id")?,
            teacher_id: row.try_get("teacher_id")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
        })),
        None => Ok(None),
    }
}

async fn delete_token_mysql(pool: &MySqlPool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM auth_tokens WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete auth token")?;
    Ok(())
}

async fn delete_expired_mysql(pool: &MySqlPool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to delete expired tokens")?;
    Ok(result.rows_affected())
}
