//! Attendance session model
//!
//! A session is a single teacher-created attendance window identified by a
//! short numeric join code. It carries the geofence reference point and the
//! per-session toggles that decide which validation gates run.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Attendance session entity.
///
/// Sessions are created by a teacher, mutated only by attendance submissions
/// and close operations, and never deleted in normal flow. Once `is_active`
/// is false the session is terminal; no state allows un-closing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: i64,
    /// 6-digit numeric join code (unique, human-shareable)
    pub code: String,
    /// Owning teacher id
    pub created_by: i64,
    /// Subject taught in this session
    pub subject: String,
    /// Course (e.g. MCA, BCA)
    pub course: String,
    /// Academic year (e.g. FY, SY, TY)
    pub year: String,
    /// Class division (e.g. A, B)
    pub division: String,
    /// Room number (optional)
    pub room: Option<String>,
    /// Geofence reference point, fixed at creation
    pub location: GeoPoint,
    /// Geofence radius in meters
    pub radius_m: f64,
    /// Session duration in minutes
    pub duration_minutes: i64,
    /// Whether the session is still accepting submissions
    pub is_active: bool,
    /// Whether submissions must include a GPS location within the radius
    pub location_required: bool,
    /// Whether submissions must include a verified face photo
    pub face_required: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiry deadline (`created_at + duration_minutes`), precomputed so
    /// expiry checks and sweeps are a single comparison
    pub expires_at: DateTime<Utc>,
    /// When the session was closed (manual or auto-expiry)
    pub closed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Check whether the session has passed its expiry deadline.
    ///
    /// An expired session may still be marked active in the store until a
    /// reader or the background sweep transitions it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Compute the expiry deadline for a session created at `created_at`.
    pub fn expiry_deadline(created_at: DateTime<Utc>, duration_minutes: i64) -> DateTime<Utc> {
        created_at + Duration::minutes(duration_minutes)
    }
}

/// Input for creating a new attendance session
#[derive(Debug, Clone)]
pub struct CreateSessionInput {
    pub subject: String,
    pub course: String,
    pub year: String,
    pub division: String,
    pub room: Option<String>,
    pub location: GeoPoint,
    pub radius_m: Option<f64>,
    pub duration_minutes: Option<i64>,
    pub location_required: bool,
    pub face_required: bool,
}

/// A single accepted attendance submission.
///
/// Records are append-only: created exactly once per accepted submission and
/// never mutated or deleted. Within one session there is at most one record
/// per roll number (case-insensitive) and one per device id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Unique identifier
    pub id: i64,
    /// Session this record belongs to
    pub session_id: i64,
    /// Student roll number, normalized to uppercase
    pub roll_no: String,
    /// Student-supplied name
    pub name: String,
    /// Client-generated device fingerprint
    pub device_id: String,
    /// Client IP address (informational only; never used for duplicate
    /// detection because shared NATs would reject whole classrooms)
    pub ip: Option<String>,
    /// Submission location; present only when the session required it
    pub location: Option<GeoPoint>,
    /// Server time at acceptance
    pub marked_at: DateTime<Utc>,
}
