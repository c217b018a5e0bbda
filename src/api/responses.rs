//! API response types
//!
//! Wire-format DTOs for every endpoint. Field names are camelCase to match
//! the clients; internal models stay snake_case and are converted here.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geo::GeoPoint;
use crate::models::{AttendanceRecord, Session, Student, Teacher};

/// Teacher account, without credentials
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
}

impl From<Teacher> for TeacherResponse {
    fn from(teacher: Teacher) -> Self {
        Self {
            id: teacher.id,
            email: teacher.email,
            name: teacher.name,
        }
    }
}

/// Successful login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub teacher: TeacherResponse,
}

/// Attendance session summary
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// The shareable join code; clients know sessions by code, not row id
    pub session_id: String,
    pub subject: String,
    pub course: String,
    pub year: String,
    pub division: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub geo_location: GeoPoint,
    pub max_distance: f64,
    pub duration_minutes: i64,
    pub is_active: bool,
    pub is_location_required: bool,
    pub is_face_recog_required: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub attendance_count: i64,
}

impl SessionResponse {
    pub fn from_session(session: Session, attendance_count: i64) -> Self {
        Self {
            session_id: session.code,
            subject: session.subject,
            course: session.course,
            year: session.year,
            division: session.division,
            room: session.room,
            geo_location: session.location,
            max_distance: session.radius_m,
            duration_minutes: session.duration_minutes,
            is_active: session.is_active,
            is_location_required: session.location_required,
            is_face_recog_required: session.face_required,
            created_at: session.created_at,
            expires_at: session.expires_at,
            closed_at: session.closed_at,
            attendance_count,
        }
    }
}

/// One accepted attendance record
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordResponse {
    pub roll_no: String,
    pub name: String,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_location: Option<GeoPoint>,
    pub marked_at: DateTime<Utc>,
}

impl From<AttendanceRecord> for AttendanceRecordResponse {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            roll_no: record.roll_no,
            name: record.name,
            device_id: record.device_id,
            geo_location: record.location,
            marked_at: record.marked_at,
        }
    }
}

/// Session detail with its attendance list (live dashboard)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub attendance: Vec<AttendanceRecordResponse>,
}

/// Accepted attendance submission
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceResponse {
    pub message: String,
    pub attendance_count: i64,
    pub record: AttendanceRecordResponse,
}

/// Registered student
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResponse {
    pub id: i64,
    pub roll: String,
    pub name: String,
    pub has_face_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        let has_face_data = student.has_face_data();
        Self {
            id: student.id,
            roll: student.roll,
            name: student.name,
            has_face_data,
            profile_image: student.profile_image,
            created_at: student.created_at,
            updated_at: student.updated_at,
        }
    }
}

/// Paginated student list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentListResponse {
    pub students: Vec<StudentResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_response_uses_camel_case() {
        let created_at = Utc::now();
        let session = Session {
            id: 1,
            code: "123456".to_string(),
            created_by: 1,
            subject: "AI".to_string(),
            course: "MCA".to_string(),
            year: "FY".to_string(),
            division: "A".to_string(),
            room: None,
            location: GeoPoint {
                latitude: 18.52,
                longitude: 73.85,
            },
            radius_m: 50.0,
            duration_minutes: 15,
            is_active: true,
            location_required: true,
            face_required: false,
            created_at,
            expires_at: Session::expiry_deadline(created_at, 15),
            closed_at: None,
        };

        let json =
            serde_json::to_value(SessionResponse::from_session(session, 3)).expect("serialize");
        assert_eq!(json["sessionId"], "123456");
        assert_eq!(json["maxDistance"], 50.0);
        assert_eq!(json["isLocationRequired"], true);
        assert_eq!(json["isFaceRecogRequired"], false);
        assert_eq!(json["attendanceCount"], 3);
        assert_eq!(json["geoLocation"]["latitude"], 18.52);
        // Absent optional fields are omitted entirely
        assert!(json.get("room").is_none());
        assert!(json.get("closedAt").is_none());
    }

    #[test]
    fn test_student_response_hides_embeddings() {
        let now = Utc::now();
        let student = Student {
            id: 7,
            roll: "A42".to_string(),
            name: "Asha".to_string(),
            face_embeddings: vec![0.1, 0.2],
            profile_image: Some("/uploads/x.jpg".to_string()),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(StudentResponse::from(student)).expect("serialize");
        assert_eq!(json["hasFaceData"], true);
        assert!(json.get("faceEmbeddings").is_none());
        assert_eq!(json["profileImage"], "/uploads/x.jpg");
    }
}
