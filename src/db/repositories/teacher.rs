//! Teacher repository
//!
//! Database operations for teacher accounts.
//!
//! This module provides:
//! - `TeacherRepository` trait defining the interface for teacher data access
//! - `SqlxTeacherRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Teacher;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Teacher repository trait
#[async_trait]
pub trait TeacherRepository: Send + Sync {
    /// Create a new teacher account with an already-hashed password
    async fn create(&self, email: &str, name: &str, password_hash: &str) -> Result<Teacher>;

    /// Get teacher by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Teacher>>;

    /// Get teacher by email
    async fn get_by_email(&self, email: &str) -> Result<Option<Teacher>>;

    /// Count total teachers
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based teacher repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTeacherRepository {
    pool: DynDatabasePool,
}

impl SqlxTeacherRepository {
    /// Create a new SQLx teacher repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TeacherRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TeacherRepository for SqlxTeacherRepository {
    async fn create(&self, email: &str, name: &str, password_hash: &str) -> Result<Teacher> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_teacher_sqlite(self.pool.as_sqlite().unwrap(), email, name, password_hash)
                    .await
            }
            DatabaseDriver::Mysql => {
                create_teacher_mysql(self.pool.as_mysql().unwrap(), email, name, password_hash)
                    .await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Teacher>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_teacher_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => {
                get_teacher_by_id_mysql(self.pool.as_mysql().unwrap(), id).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Teacher>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_teacher_by_email_sqlite(self.pool.as_sqlite().unwrap(), email).await
            }
            DatabaseDriver::Mysql => {
                get_teacher_by_email_mysql(self.pool.as_mysql().unwrap(), email).await
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_teachers_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => count_teachers_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_teacher_sqlite(
    pool: &SqlitePool,
    email: &str,
    name: &str,
    password_hash: &str,
) -> Result<Teacher> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO teachers (email, name, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create teacher")?;

    Ok(Teacher {
        id: result.last_insert_rowid(),
        email: email.to_string(),
        name: name.to_string(),
        password_hash: password_hash.to_string(),
        created_at: now,
    })
}

async fn get_teacher_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Teacher>> {
    let row = sqlx::query(
        "SELECT id, email, name, password_hash, created_at FROM teachers WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get teacher by ID")?;

    row.map(|row| row_to_teacher_sqlite(&row)).transpose()
}

async fn get_teacher_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<Teacher>> {
    let row = sqlx::query(
        "SELECT id, email, name, password_hash, created_at FROM teachers WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to get teacher by email")?;

    row.map(|row| row_to_teacher_sqlite(&row)).transpose()
}

async fn count_teachers_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM teachers")
        .fetch_one(pool)
        .await
        .context("Failed to count teachers")?;
    Ok(row.get("count"))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_teacher_mysql(
    pool: &MySqlPool,
    email: &str,
    name: &str,
    password_hash: &str,
) -> Result<Teacher> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO teachers (email, name, password_hash, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create teacher")?;

    Ok(Teacher {
        id: result.last_insert_id() as i64,
        email: email.to_string(),
        name: name.to_string(),
        password_hash: password_hash.to_string(),
        created_at: now,
    })
}

async fn get_teacher_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Teacher>> {
    let row = sqlx::query(
        "SELECT id, email, name, password_hash, created_at FROM teachers WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get teacher by ID")?;

    row.map(|row| row_to_teacher_mysql(&row)).transpose()
}

async fn get_teacher_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<Teacher>> {
    let row = sqlx::query(
        "SELECT id, email, name, password_hash, created_at FROM teachers WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to get teacher by email")?;

    row.map(|row| row_to_teacher_mysql(&row)).transpose()
}

async fn count_teachers_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM teachers")
        .fetch_one(pool)
        .await
        .context("Failed to count teachers")?;
    Ok(row.get("count"))
}

// ============================================================================
// Row conversion
// ============================================================================

fn row_to_teacher_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Teacher> {
    Ok(Teacher {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_teacher_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Teacher> {
    Ok(Teacher {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}
