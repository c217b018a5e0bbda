//! Attendance repository
//!
//! Append-only storage for accepted attendance submissions.
//!
//! The duplicate gates lean on the table's UNIQUE constraints rather than
//! check-then-insert: two racing submissions with the same roll number or
//! device id can never both commit, whatever the interleaving. The
//! `roll_exists`/`device_exists` pre-checks exist only so the common
//! (non-racing) path reports the right error before any insert is attempted.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::geo::GeoPoint;
use crate::models::AttendanceRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Error from appending an attendance record
#[derive(Debug, thiserror::Error)]
pub enum AppendAttendanceError {
    /// The roll number already has a record in this session
    #[error("roll number already marked in this session")]
    DuplicateRoll,
    /// The device id already has a record in this session
    #[error("device already marked in this session")]
    DuplicateDevice,
    /// Any other database failure
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Attendance repository trait
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Append a record (the `id` field of the input is ignored).
    ///
    /// Duplicate roll/device within the session surface as typed errors,
    /// backed by the table's UNIQUE constraints.
    async fn append(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, AppendAttendanceError>;

    /// Check whether a roll number already has a record in the session
    async fn roll_exists(&self, session_id: i64, roll_no: &str) -> Result<bool>;

    /// Check whether a device id already has a record in the session
    async fn device_exists(&self, session_id: i64, device_id: &str) -> Result<bool>;

    /// List all records for a session, oldest first
    async fn list_for_session(&self, session_id: i64) -> Result<Vec<AttendanceRecord>>;

    /// Count records for a session
    async fn count_for_session(&self, session_id: i64) -> Result<i64>;
}

/// SQLx-based attendance repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxAttendanceRepository {
    pool: DynDatabasePool,
}

impl SqlxAttendanceRepository {
    /// Create a new SQLx attendance repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AttendanceRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AttendanceRepository for SqlxAttendanceRepository {
    async fn append(
        &self,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord, AppendAttendanceError> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                append_sqlite(self.pool.as_sqlite().unwrap(), record).await
            }
            DatabaseDriver::Mysql => append_mysql(self.pool.as_mysql().unwrap(), record).await,
        }
    }

    async fn roll_exists(&self, session_id: i64, roll_no: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                roll_exists_sqlite(self.pool.as_sqlite().unwrap(), session_id, roll_no).await
            }
            DatabaseDriver::Mysql => {
                roll_exists_mysql(self.pool.as_mysql().unwrap(), session_id, roll_no).await
            }
        }
    }

    async fn device_exists(&self, session_id: i64, device_id: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                device_exists_sqlite(self.pool.as_sqlite().unwrap(), session_id, device_id).await
            }
            DatabaseDriver::Mysql => {
                device_exists_mysql(self.pool.as_mysql().unwrap(), session_id, device_id).await
            }
        }
    }

    async fn list_for_session(&self, session_id: i64) -> Result<Vec<AttendanceRecord>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_sqlite(self.pool.as_sqlite().unwrap(), session_id).await
            }
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap(), session_id).await,
        }
    }

    async fn count_for_session(&self, session_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_sqlite(self.pool.as_sqlite().unwrap(), session_id).await
            }
            DatabaseDriver::Mysql => count_mysql(self.pool.as_mysql().unwrap(), session_id).await,
        }
    }
}

/// Map a unique-violation to the matching typed error.
fn map_append_error(err: sqlx::Error) -> AppendAttendanceError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            if let Some(mapped) = classify_unique_violation(db_err.message()) {
                return mapped;
            }
        }
    }
    AppendAttendanceError::Database(
        anyhow::Error::new(err).context("Failed to append attendance record"),
    )
}

/// Classify which of the two attendance constraints a unique violation hit.
///
/// SQLite names the violated columns ("attendance_records.roll_no"); MySQL
/// names the constraint ("uq_attendance_roll") but also embeds the duplicate
/// value, which may itself contain words like "roll". Match the constraint
/// and column tokens, never bare words.
fn classify_unique_violation(message: &str) -> Option<AppendAttendanceError> {
    if message.contains("uq_attendance_roll") || message.contains("attendance_records.roll_no") {
        return Some(AppendAttendanceError::DuplicateRoll);
    }
    if message.contains("uq_attendance_device") || message.contains("attendance_records.device_id")
    {
        return Some(AppendAttendanceError::DuplicateDevice);
    }
    None
}

const RECORD_COLUMNS: &str =
    "id, session_id, roll_no, name, device_id, ip, latitude, longitude, marked_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn append_sqlite(
    pool: &SqlitePool,
    record: &AttendanceRecord,
) -> Result<AttendanceRecord, AppendAttendanceError> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records (session_id, roll_no, name, device_id, ip,
            latitude, longitude, marked_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.session_id)
    .bind(&record.roll_no)
    .bind(&record.name)
    .bind(&record.device_id)
    .bind(&record.ip)
    .bind(record.location.map(|p| p.latitude))
    .bind(record.location.map(|p| p.longitude))
    .bind(record.marked_at)
    .execute(pool)
    .await
    .map_err(map_append_error)?;

    Ok(AttendanceRecord {
        id: result.last_insert_rowid(),
        ..record.clone()
    })
}

async fn roll_exists_sqlite(pool: &SqlitePool, session_id: i64, roll_no: &str) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM attendance_records WHERE session_id = ? AND roll_no = ?",
    )
    .bind(session_id)
    .bind(roll_no)
    .fetch_one(pool)
    .await
    .context("Failed to check roll number")?;
    Ok(row.get::<i64, _>("count") > 0)
}

async fn device_exists_sqlite(
    pool: &SqlitePool,
    session_id: i64,
    device_id: &str,
) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM attendance_records WHERE session_id = ? AND device_id = ?",
    )
    .bind(session_id)
    .bind(device_id)
    .fetch_one(pool)
    .await
    .context("Failed to check device id")?;
    Ok(row.get::<i64, _>("count") > 0)
}

async fn list_sqlite(pool: &SqlitePool, session_id: i64) -> Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM attendance_records WHERE session_id = ? ORDER BY marked_at ASC, id ASC",
        RECORD_COLUMNS
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await
    .context("Failed to list attendance records")?;

    rows.iter().map(row_to_record_sqlite).collect()
}

async fn count_sqlite(pool: &SqlitePool, session_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM attendance_records WHERE session_id = ?")
        .bind(session_id)
        .fetch_one(pool)
        .await
        .context("Failed to count attendance records")?;
    Ok(row.get("count"))
}

fn row_to_record_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<AttendanceRecord> {
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    Ok(AttendanceRecord {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        roll_no: row.try_get("roll_no")?,
        name: row.try_get("name")?,
        device_id: row.try_get("device_id")?,
        ip: row.try_get("ip")?,
        location: match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        },
        marked_at: row.try_get("marked_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn append_mysql(
    pool: &MySqlPool,
    record: &AttendanceRecord,
) -> Result<AttendanceRecord, AppendAttendanceError> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records (session_id, roll_no, name, device_id, ip,
            latitude, longitude, marked_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.session_id)
    .bind(&record.roll_no)
    .bind(&record.name)
    .bind(&record.device_id)
    .bind(&record.ip)
    .bind(record.location.map(|p| p.latitude))
    .bind(record.location.map(|p| p.longitude))
    .bind(record.marked_at)
    .execute(pool)
    .await
    .map_err(map_append_error)?;

    Ok(AttendanceRecord {
        id: result.last_insert_id() as i64,
        ..record.clone()
    })
}

async fn roll_exists_mysql(pool: &MySqlPool, session_id: i64, roll_no: &str) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM attendance_records WHERE session_id = ? AND roll_no = ?",
    )
    .bind(session_id)
    .bind(roll_no)
    .fetch_one(pool)
    .await
    .context("Failed to check roll number")?;
    Ok(row.get::<i64, _>("count") > 0)
}

async fn device_exists_mysql(
    pool: &MySqlPool,
    session_id: i64,
    device_id: &str,
) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM attendance_records WHERE session_id = ? AND device_id = ?",
    )
    .bind(session_id)
    .bind(device_id)
    .fetch_one(pool)
    .await
    .context("Failed to check device id")?;
    Ok(row.get::<i64, _>("count") > 0)
}

async fn list_mysql(pool: &MySqlPool, session_id: i64) -> Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM attendance_records WHERE session_id = ? ORDER BY marked_at ASC, id ASC",
        RECORD_COLUMNS
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await
    .context("Failed to list attendance records")?;

    rows.iter().map(row_to_record_mysql).collect()
}

async fn count_mysql(pool: &MySqlPool, session_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM attendance_records WHERE session_id = ?")
        .bind(session_id)
        .fetch_one(pool)
        .await
        .context("Failed to count attendance records")?;
    Ok(row.get("count"))
}

fn row_to_record_mysql(row: &sqlx::mysql::MySqlRow) -> Result<AttendanceRecord> {
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    Ok(AttendanceRecord {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        roll_no: row.try_get("roll_no")?,
        name: row.try_get("name")?,
        device_id: row.try_get("device_id")?,
        ip: row.try_get("ip")?,
        location: match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        },
        marked_at: row.try_get("marked_at")?,
    })
}
