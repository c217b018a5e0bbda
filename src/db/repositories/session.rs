//! Session repository
//!
//! Database operations for attendance sessions.
//!
//! This module provides:
//! - `SessionRepository` trait defining the interface for session data access
//! - `SqlxSessionRepository` implementing the trait for SQLite and MySQL
//!
//! Join-code uniqueness is enforced by the UNIQUE constraint on
//! `sessions.code`; a collision surfaces as `SessionInsertError::DuplicateCode`
//! so the service layer can regenerate and retry.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::geo::GeoPoint;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Error from inserting a new session
#[derive(Debug, thiserror::Error)]
pub enum SessionInsertError {
    /// The generated join code is already in use
    #[error("join code already in use")]
    DuplicateCode,
    /// Any other database failure
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session (the `id` field of the input is ignored)
    async fn create(&self, session: &Session) -> Result<Session, SessionInsertError>;

    /// Get session by join code
    async fn get_by_code(&self, code: &str) -> Result<Option<Session>>;

    /// Get session by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Session>>;

    /// List sessions created by a teacher, newest first
    async fn list_by_teacher(&self, teacher_id: i64) -> Result<Vec<Session>>;

    /// Mark a session inactive with the given close timestamp.
    ///
    /// A no-op if the session is already closed; closing is terminal.
    async fn close(&self, id: i64, closed_at: DateTime<Utc>) -> Result<()>;

    /// Close every active session whose deadline has passed.
    ///
    /// `closed_at` is set to the session's own `expires_at`, not the sweep
    /// time. Returns the number of sessions transitioned.
    async fn close_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session, SessionInsertError> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_session_sqlite(self.pool.as_sqlite().unwrap(), session).await
            }
            DatabaseDriver::Mysql => {
                create_session_mysql(self.pool.as_mysql().unwrap(), session).await
            }
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_session_by_code_sqlite(self.pool.as_sqlite().unwrap(), code).await
            }
            DatabaseDriver::Mysql => {
                get_session_by_code_mysql(self.pool.as_mysql().unwrap(), code).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_session_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => {
                get_session_by_id_mysql(self.pool.as_mysql().unwrap(), id).await
            }
        }
    }

    async fn list_by_teacher(&self, teacher_id: i64) -> Result<Vec<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_sessions_sqlite(self.pool.as_sqlite().unwrap(), teacher_id).await
            }
            DatabaseDriver::Mysql => {
                list_sessions_mysql(self.pool.as_mysql().unwrap(), teacher_id).await
            }
        }
    }

    async fn close(&self, id: i64, closed_at: DateTime<Utc>) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                close_session_sqlite(self.pool.as_sqlite().unwrap(), id, closed_at).await
            }
            DatabaseDriver::Mysql => {
                close_session_mysql(self.pool.as_mysql().unwrap(), id, closed_at).await
            }
        }
    }

    async fn close_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                close_expired_sqlite(self.pool.as_sqlite().unwrap(), now).await
            }
            DatabaseDriver::Mysql => close_expired_mysql(self.pool.as_mysql().unwrap(), now).await,
        }
    }
}

/// Map a unique-violation on the session code to the typed error
fn map_insert_error(err: sqlx::Error) -> SessionInsertError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return SessionInsertError::DuplicateCode;
        }
    }
    SessionInsertError::Database(anyhow::Error::new(err).context("Failed to create session"))
}

const SESSION_COLUMNS: &str = "id, code, created_by, subject, course, year, division, room, \
     latitude, longitude, radius_m, duration_minutes, is_active, location_required, \
     face_required, created_at, expires_at, closed_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(
    pool: &SqlitePool,
    session: &Session,
) -> Result<Session, SessionInsertError> {
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (code, created_by, subject, course, year, division, room,
            latitude, longitude, radius_m, duration_minutes, is_active,
            location_required, face_required, created_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.code)
    .bind(session.created_by)
    .bind(&session.subject)
    .bind(&session.course)
    .bind(&session.year)
    .bind(&session.division)
    .bind(&session.room)
    .bind(session.location.latitude)
    .bind(session.location.longitude)
    .bind(session.radius_m)
    .bind(session.duration_minutes)
    .bind(session.is_active)
    .bind(session.location_required)
    .bind(session.face_required)
    .bind(session.created_at)
    .bind(session.expires_at)
    .execute(pool)
    .await
    .map_err(map_insert_error)?;

    Ok(Session {
        id: result.last_insert_rowid(),
        ..session.clone()
    })
}

async fn get_session_by_code_sqlite(pool: &SqlitePool, code: &str) -> Result<Option<Session>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE code = ?",
        SESSION_COLUMNS
    ))
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by code")?;

    row.map(|row| row_to_session_sqlite(&row)).transpose()
}

async fn get_session_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Session>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE id = ?",
        SESSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    row.map(|row| row_to_session_sqlite(&row)).transpose()
}

async fn list_sessions_sqlite(pool: &SqlitePool, teacher_id: i64) -> Result<Vec<Session>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE created_by = ? ORDER BY created_at DESC",
        SESSION_COLUMNS
    ))
    .bind(teacher_id)
    .fetch_all(pool)
    .await
    .context("Failed to list sessions")?;

    rows.iter().map(row_to_session_sqlite).collect()
}

async fn close_session_sqlite(
    pool: &SqlitePool,
    id: i64,
    closed_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE sessions SET is_active = 0, closed_at = ? WHERE id = ? AND is_active = 1")
        .bind(closed_at)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to close session")?;
    Ok(())
}

async fn close_expired_sqlite(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE sessions SET is_active = 0, closed_at = expires_at \
         WHERE is_active = 1 AND expires_at <= ?",
    )
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to close expired sessions")?;
    Ok(result.rows_affected())
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        created_by: row.try_get("created_by")?,
        subject: row.try_get("subject")?,
        course: row.try_get("course")?,
        year: row.try_get("year")?,
        division: row.try_get("division")?,
        room: row.try_get("room")?,
        location: GeoPoint {
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
        },
        radius_m: row.try_get("radius_m")?,
        duration_minutes: row.try_get("duration_minutes")?,
        is_active: row.try_get("is_active")?,
        location_required: row.try_get("location_required")?,
        face_required: row.try_get("face_required")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        closed_at: row.try_get("closed_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(
    pool: &MySqlPool,
    session: &Session,
) -> Result<Session, SessionInsertError> {
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (code, created_by, subject, course, year, division, room,
            latitude, longitude, radius_m, duration_minutes, is_active,
            location_required, face_required, created_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.code)
    .bind(session.created_by)
    .bind(&session.subject)
    .bind(&session.course)
    .bind(&session.year)
    .bind(&session.division)
    .bind(&session.room)
    .bind(session.location.latitude)
    .bind(session.location.longitude)
    .bind(session.radius_m)
    .bind(session.duration_minutes)
    .bind(session.is_active)
    .bind(session.location_required)
    .bind(session.face_required)
    .bind(session.created_at)
    .bind(session.expires_at)
    .execute(pool)
    .await
    .map_err(map_insert_error)?;

    Ok(Session {
        id: result.last_insert_id() as i64,
        ..session.clone()
    })
}

async fn get_session_by_code_mysql(pool: &MySqlPool, code: &str) -> Result<Option<Session>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE code = ?",
        SESSION_COLUMNS
    ))
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by code")?;

    row.map(|row| row_to_session_mysql(&row)).transpose()
}

async fn get_session_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Session>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE id = ?",
        SESSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    row.map(|row| row_to_session_mysql(&row)).transpose()
}

async fn list_sessions_mysql(pool: &MySqlPool, teacher_id: i64) -> Result<Vec<Session>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE created_by = ? ORDER BY created_at DESC",
        SESSION_COLUMNS
    ))
    .bind(teacher_id)
    .fetch_all(pool)
    .await
    .context("Failed to list sessions")?;

    rows.iter().map(row_to_session_mysql).collect()
}

async fn close_session_mysql(pool: &MySqlPool, id: i64, closed_at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "UPDATE sessions SET is_active = FALSE, closed_at = ? WHERE id = ? AND is_active = TRUE",
    )
    .bind(closed_at)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to close session")?;
    Ok(())
}

async fn close_expired_mysql(pool: &MySqlPool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE sessions SET is_active = FALSE, closed_at = expires_at \
         WHERE is_active = TRUE AND expires_at <= ?",
    )
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to close expired sessions")?;
    Ok(result.rows_affected())
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        created_by: row.try_get("created_by")?,
        subject: row.try_get("subject")?,
        course: row.try_get("course")?,
        year: row.try_get("year")?,
        division: row.try_get("division")?,
        room: row.try_get("room")?,
        location: GeoPoint {
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
        },
        radius_m: row.try_get("radius_m")?,
        duration_minutes: row.try_get("duration_minutes")?,
        is_active: row.try_get("is_active")?,
        location_required: row.try_get("location_required")?,
        face_required: row.try_get("face_required")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        closed_at: row.try_get("closed_at")?,
    })
}
